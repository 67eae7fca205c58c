use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// A 4-digit postal code, the unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Postcode(String);

impl Postcode {
    pub fn from_number(code: u16) -> anyhow::Result<Self> {
        if code > 9999 {
            anyhow::bail!("Postcode out of range: {code}");
        }
        Ok(Self(format!("{code:04}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Postcode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(anyhow!("Invalid postcode {s:?}, expected 4 digits"))
        }
    }
}

impl TryFrom<String> for Postcode {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Postcode> for String {
    fn from(postcode: Postcode) -> Self {
        postcode.0
    }
}

impl fmt::Display for Postcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    Nsw,
    Act,
    Vic,
    Qld,
    Sa,
    Wa,
    Tas,
    Nt,
}

impl State {
    pub const ALL: [State; 8] = [
        State::Nsw,
        State::Act,
        State::Vic,
        State::Qld,
        State::Sa,
        State::Wa,
        State::Tas,
        State::Nt,
    ];

    /// Inclusive postcode ranges allocated to the state
    pub fn ranges(self) -> &'static [(u16, u16)] {
        match self {
            State::Nsw => &[(2000, 2599), (2619, 2899), (2921, 2999)],
            State::Act => &[(2600, 2618), (2900, 2920)],
            State::Vic => &[(3000, 3999)],
            State::Qld => &[(4000, 4999)],
            State::Sa => &[(5000, 5799)],
            State::Wa => &[(6000, 6797)],
            State::Tas => &[(7000, 7799)],
            State::Nt => &[(800, 899)],
        }
    }

    pub fn postcodes(self) -> impl Iterator<Item = Postcode> {
        self.ranges()
            .iter()
            .flat_map(|&(start, end)| start..=end)
            .map(|code| Postcode(format!("{code:04}")))
    }
}

/// The complete crawl work list, in table order.
pub fn postcodes() -> Vec<Postcode> {
    State::ALL.iter().flat_map(|s| s.postcodes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postcodes_are_zero_padded() {
        let nt = State::Nt.postcodes().collect::<Vec<_>>();
        assert_eq!(nt.first().map(Postcode::as_str), Some("0800"));
        assert_eq!(nt.last().map(Postcode::as_str), Some("0899"));
        assert_eq!(nt.len(), 100);
    }

    #[test]
    fn work_list_covers_every_range() {
        let all = postcodes();
        let expected: usize = State::ALL
            .iter()
            .flat_map(|s| s.ranges())
            .map(|(start, end)| (end - start + 1) as usize)
            .sum();
        assert_eq!(all.len(), expected);
        assert_eq!(all[0].as_str(), "2000");
        assert!(all.iter().all(|p| p.as_str().len() == 4));
    }

    #[test]
    fn act_ranges_are_not_in_nsw() {
        let nsw = State::Nsw.postcodes().collect::<Vec<_>>();
        assert!(!nsw.contains(&"2600".parse().unwrap()));
        assert!(!nsw.contains(&"2910".parse().unwrap()));
        assert!(State::Act.postcodes().any(|p| p.as_str() == "2910"));
    }

    #[test]
    fn parse_rejects_malformed_codes() {
        assert!("200".parse::<Postcode>().is_err());
        assert!("20a0".parse::<Postcode>().is_err());
        assert!("20000".parse::<Postcode>().is_err());
        assert_eq!(" 3000 ".parse::<Postcode>().unwrap().as_str(), "3000");
        assert_eq!(Postcode::from_number(800).unwrap().as_str(), "0800");
    }
}
