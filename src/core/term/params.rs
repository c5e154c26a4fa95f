//! Parsed CSI/DCS parameter lists.
//!
//! A parameter list is a sequence of groups separated by `;`, where each
//! group may carry `:`-separated subparameters (used by SGR underline styles
//! and extended colors).

/// Parameters attached to a CSI or DCS sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    groups: Vec<Vec<u32>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a parameter list from plain (subparameter-free) values.
    #[allow(dead_code)]
    pub fn from_slice(values: &[u32]) -> Self {
        Self {
            groups: values.iter().map(|&v| vec![v]).collect(),
        }
    }

    /// Append a single-value group.
    pub fn add_param(&mut self, value: u32) {
        self.groups.push(vec![value]);
    }

    /// Append one group holding several subparameters.
    pub fn add_subparams(&mut self, subparams: impl Into<Vec<u32>>) {
        self.groups.push(subparams.into());
    }

    pub fn size(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First subparameter of group `index`, or 0.
    pub fn get(&self, index: usize) -> u32 {
        self.get_or(index, 0)
    }

    /// First subparameter of group `index`. An absent group, an empty group,
    /// and an explicit 0 all yield `default`.
    pub fn get_or(&self, index: usize, default: u32) -> u32 {
        match self.groups.get(index).and_then(|group| group.first()) {
            Some(&value) if value != 0 => value,
            _ => default,
        }
    }

    /// All subparameters of group `index`.
    pub fn subparams(&self, index: usize) -> &[u32] {
        self.groups.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<Vec<Vec<u32>>> for Params {
    fn from(groups: Vec<Vec<u32>>) -> Self {
        Self { groups }
    }
}

impl std::fmt::Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i != 0 {
                write!(f, ";")?;
            }
            for (j, sub) in group.iter().enumerate() {
                if j != 0 {
                    write!(f, ":")?;
                }
                write!(f, "{}", sub)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_defaults() {
        let params = Params::from_slice(&[5, 0]);
        assert_eq!(params.get(0), 5);
        assert_eq!(params.get_or(0, 1), 5);
        // Explicit zero falls back to the default.
        assert_eq!(params.get_or(1, 1), 1);
        // So does a missing group.
        assert_eq!(params.get_or(2, 7), 7);
        assert_eq!(params.get(2), 0);
    }

    #[test]
    fn test_display() {
        let mut params = Params::new();
        params.add_param(0);
        params.add_param(1);
        params.add_subparams(vec![38, 2, 255, 0, 127]);
        assert_eq!(params.to_string(), "0;1;38:2:255:0:127");

        assert_eq!(Params::new().to_string(), "");
    }

    #[test]
    fn test_size() {
        let mut params = Params::new();
        assert!(params.is_empty());
        params.add_param(4);
        params.add_subparams(vec![4, 3]);
        assert_eq!(params.size(), 2);
        assert_eq!(params.subparams(1), &[4, 3]);
    }
}
