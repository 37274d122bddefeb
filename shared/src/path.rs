use std::fmt;

use crate::error::PathError;

/// One step of a [`PropertyPath`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named property lookup
    Field(String),
    /// Position in a list
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Dotted property path with optional list indices, e.g. `items[2].name`.
///
/// The first segment is always a [`Segment::Field`]: the root property on the
/// component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<Segment>,
}

impl PropertyPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptySegment {
                    path: raw.to_string(),
                });
            }
            let (name, mut rest) = match part.find('[') {
                Some(bracket) => part.split_at(bracket),
                None => (part, ""),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(PathError::InvalidName {
                    segment: part.to_string(),
                });
            }
            segments.push(Segment::Field(name.to_string()));

            while !rest.is_empty() {
                let malformed = || PathError::MalformedIndex {
                    segment: part.to_string(),
                };
                let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
                let close = inner.find(']').ok_or_else(malformed)?;
                let digits = &inner[..close];
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(malformed());
                }
                let index = digits.parse::<usize>().map_err(|_| malformed())?;
                segments.push(Segment::Index(index));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Name of the root property
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Field(name)) => name,
            // parse() always starts with a field
            _ => "",
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Everything after the root property
    pub fn rest(&self) -> &[Segment] {
        &self.segments[1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_paths() {
        let path = PropertyPath::parse("items[2].name").unwrap();
        assert_eq!(path.root(), "items");
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("items".into()),
                Segment::Index(2),
                Segment::Field("name".into()),
            ]
        );
        assert_eq!(path.rest().len(), 2);
    }

    #[test]
    fn parses_multiple_indices() {
        let path = PropertyPath::parse("grid[1][3]").unwrap();
        assert_eq!(
            path.rest(),
            &[Segment::Index(1), Segment::Index(3)]
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(
            PropertyPath::parse(""),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("a..b"),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("items[x]"),
            Err(PathError::MalformedIndex { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("items[1"),
            Err(PathError::MalformedIndex { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("[1]"),
            Err(PathError::InvalidName { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("na-me"),
            Err(PathError::InvalidName { .. })
        ));
    }
}
