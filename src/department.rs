//! The department sequence table.
//!
//! Every order travels the same nine departments in the same order. The table
//! is pure data: positions, labels and wire identifiers. Presentation details
//! (icons, colours) belong to whoever renders the board.

use serde::{Deserialize, Serialize};

/// One production stage on the factory floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "CAD")]
    Cad,
    #[serde(rename = "PRINT")]
    Print,
    #[serde(rename = "CASTING")]
    Casting,
    #[serde(rename = "FILLING")]
    Filling,
    #[serde(rename = "MEENA")]
    Meena,
    #[serde(rename = "POLISH_1")]
    Polish1,
    #[serde(rename = "SETTING")]
    Setting,
    #[serde(rename = "POLISH_2")]
    Polish2,
    #[serde(rename = "ADDITIONAL")]
    Additional,
}

/// Canonical production path. Index + 1 is the sequence position.
const SEQUENCE: [Department; 9] = [
    Department::Cad,
    Department::Print,
    Department::Casting,
    Department::Filling,
    Department::Meena,
    Department::Polish1,
    Department::Setting,
    Department::Polish2,
    Department::Additional,
];

impl Department {
    /// All departments in production order.
    pub fn all() -> [Department; 9] {
        SEQUENCE
    }

    /// Where every order starts.
    pub fn first() -> Department {
        SEQUENCE[0]
    }

    /// 1-based position in the production path.
    pub fn sequence(self) -> u8 {
        // Discriminants follow declaration order, which is the sequence order.
        self as u8 + 1
    }

    /// Department at a 1-based position, if any.
    pub fn at(position: u8) -> Option<Department> {
        position
            .checked_sub(1)
            .and_then(|i| SEQUENCE.get(i as usize))
            .copied()
    }

    /// The next department, or `None` once the path is finished.
    pub fn next(self) -> Option<Department> {
        Department::at(self.sequence() + 1)
    }

    /// Is this the final department?
    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Department::Cad => "CAD",
            Department::Print => "Print",
            Department::Casting => "Casting",
            Department::Filling => "Filling",
            Department::Meena => "Meena",
            Department::Polish1 => "Polish 1",
            Department::Setting => "Setting",
            Department::Polish2 => "Polish 2",
            Department::Additional => "Additional",
        }
    }

    /// Wire identifier, as stored and as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Department::Cad => "CAD",
            Department::Print => "PRINT",
            Department::Casting => "CASTING",
            Department::Filling => "FILLING",
            Department::Meena => "MEENA",
            Department::Polish1 => "POLISH_1",
            Department::Setting => "SETTING",
            Department::Polish2 => "POLISH_2",
            Department::Additional => "ADDITIONAL",
        }
    }
}

/// Free-function forms of the table lookups.
pub fn sequence_of(department: Department) -> u8 {
    department.sequence()
}

pub fn next_department(department: Department) -> Option<Department> {
    department.next()
}

pub fn all_departments() -> [Department; 9] {
    Department::all()
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Department {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let normalized = match normalized.as_str() {
            "POLISH1" => "POLISH_1",
            "POLISH2" => "POLISH_2",
            other => other,
        };
        SEQUENCE
            .iter()
            .copied()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| crate::error::Error::Other(format!("unknown department: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_run_one_through_nine() {
        let positions: Vec<u8> = Department::all().iter().map(|d| d.sequence()).collect();
        assert_eq!(positions, (1..=9).collect::<Vec<u8>>());
    }

    #[test]
    fn next_walks_the_whole_path() {
        let mut walked = vec![Department::first()];
        while let Some(next) = walked.last().and_then(|d| d.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Department::all().to_vec());
        assert!(Department::Additional.is_last());
    }

    #[test]
    fn polish_two_is_followed_by_additional() {
        assert_eq!(sequence_of(Department::Polish2), 8);
        assert_eq!(next_department(Department::Polish2), Some(Department::Additional));
        assert_eq!(next_department(Department::Additional), None);
    }

    #[test]
    fn parses_wire_and_loose_names() {
        assert_eq!("POLISH_1".parse::<Department>().unwrap(), Department::Polish1);
        assert_eq!("polish-2".parse::<Department>().unwrap(), Department::Polish2);
        assert_eq!("cad".parse::<Department>().unwrap(), Department::Cad);
        assert!("ENGRAVING".parse::<Department>().is_err());
    }

    #[test]
    fn serde_uses_wire_identifiers() {
        let json = serde_json::to_string(&Department::Polish1).unwrap();
        assert_eq!(json, "\"POLISH_1\"");
        let back: Department = serde_json::from_str("\"SETTING\"").unwrap();
        assert_eq!(back, Department::Setting);
    }

    #[test]
    fn at_rejects_out_of_range() {
        assert_eq!(Department::at(0), None);
        assert_eq!(Department::at(10), None);
        assert_eq!(Department::at(5), Some(Department::Meena));
    }
}
