//! Inspection step identifiers

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An inspection step: `Step 3`, or a Step 5 sub-step such as `Step 5（2）`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    number: u32,
    sub: Option<u32>,
}

impl Step {
    pub const fn new(number: u32) -> Self {
        Self { number, sub: None }
    }

    pub const fn sub(number: u32, sub: u32) -> Self {
        Self {
            number,
            sub: Some(sub),
        }
    }

    /// Default bucket for images nothing else matched
    pub const fn fallback() -> Self {
        Self::new(1)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn sub_number(&self) -> Option<u32> {
        self.sub
    }

    /// Label as written in the report, e.g. `Step 5（1）`
    pub fn label(&self) -> String {
        match self.sub {
            Some(sub) => format!("Step {}（{}）", self.number, sub),
            None => format!("Step {}", self.number),
        }
    }

    /// Ordering key: the label without `Step ` and without parentheses.
    ///
    /// Keys compare as strings, so `Step 10` sorts before `Step 2`.
    pub fn sort_key(&self) -> String {
        self.label()
            .replace("Step ", "")
            .replace(['（', '）', '(', ')'], "")
    }

    /// Steps that have their own row on the reference-pictures sheet
    pub fn is_displayed(&self) -> bool {
        match self.sub {
            None => (1..=4).contains(&self.number),
            Some(sub) => self.number == 5 && (1..=5).contains(&sub),
        }
    }

    /// Every step bucket the reference sheet shows, in display order
    pub fn display_buckets() -> Vec<Step> {
        (1..=4)
            .map(Step::new)
            .chain((1..=5).map(|sub| Step::sub(5, sub)))
            .collect()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid step: '{}'. Use e.g. 'Step 3' or 'Step 5(2)'", s);

        let normalized = s
            .trim()
            .replace(['（', '('], "(")
            .replace(['）', ')'], ")")
            .to_lowercase();
        let body = normalized
            .strip_prefix("step")
            .unwrap_or(&normalized)
            .trim_start_matches([' ', '_']);

        let (number, sub) = match body.split_once('(') {
            Some((number, rest)) => {
                let sub = rest.strip_suffix(')').ok_or_else(invalid)?;
                (number.trim(), Some(sub.trim()))
            }
            None => (body.trim(), None),
        };

        let number: u32 = number.parse().map_err(|_| invalid())?;
        let sub = match sub {
            Some(sub) => Some(sub.parse::<u32>().map_err(|_| invalid())?),
            None => None,
        };
        if number == 0 || sub == Some(0) {
            return Err(invalid());
        }

        Ok(Self { number, sub })
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
