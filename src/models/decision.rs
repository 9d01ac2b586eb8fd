//! Trade decision returned by the advisory service.

use std::str::FromStr;

/// Action requested for the current trading cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Open a long position
    Buy,
    /// Open a short position
    Sell,
    /// Do nothing this cycle
    Skip,
    /// Close every open position
    CloseAll,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Decision::Buy,
        Decision::Sell,
        Decision::Skip,
        Decision::CloseAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Sell => "SELL",
            Decision::Skip => "SKIP",
            Decision::CloseAll => "CLOSE_ALL",
        }
    }
}

impl FromStr for Decision {
    type Err = anyhow::Error;

    /// Parse a single-word decision. Surrounding whitespace, case and a
    /// trailing period are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().trim_end_matches('.').to_uppercase();
        match word.as_str() {
            "BUY" => Ok(Decision::Buy),
            "SELL" => Ok(Decision::Sell),
            "SKIP" => Ok(Decision::Skip),
            "CLOSE_ALL" => Ok(Decision::CloseAll),
            _ => anyhow::bail!("Invalid decision: {:?}", s.trim()),
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!("BUY".parse::<Decision>().unwrap(), Decision::Buy);
        assert_eq!(" sell\n".parse::<Decision>().unwrap(), Decision::Sell);
        assert_eq!("Skip.".parse::<Decision>().unwrap(), Decision::Skip);
        assert_eq!("close_all".parse::<Decision>().unwrap(), Decision::CloseAll);

        for decision in Decision::ALL {
            assert_eq!(decision.as_str().parse::<Decision>().unwrap(), decision);
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!("HOLD".parse::<Decision>().is_err());
        assert!("BUY NOW".parse::<Decision>().is_err());
        assert!("".parse::<Decision>().is_err());
        assert!("I think you should buy".parse::<Decision>().is_err());
    }
}
