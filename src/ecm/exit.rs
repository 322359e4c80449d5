//! GMP-ECM exit-code contract.
//!
//! | code            | meaning                                   |
//! |-----------------|-------------------------------------------|
//! | `0`             | no factor found                           |
//! | bit 1 (`2`)     | factor found                              |
//! | bit 3 (`8`)     | cofactor is a probable prime (code != 8)  |
//! | exactly `8`     | the input number itself was found         |
//! | anything else   | error                                     |

use serde::Serialize;

const FACTOR_FOUND: i32 = 2;
const COFACTOR_PRP: i32 = 8;
const INPUT_NUMBER_FOUND: i32 = 8;

/// How a stage-1 run ended. `None` codes mean the process died by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage1Exit {
    /// Clean exit; the save file goes on to stage 2.
    NoFactor,
    FactorFound,
    InputNumberFound,
    Error { code: Option<i32> },
}

impl Stage1Exit {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::NoFactor,
            Some(c) if c & FACTOR_FOUND != 0 => Self::FactorFound,
            Some(INPUT_NUMBER_FOUND) => Self::InputNumberFound,
            other => Self::Error { code: other },
        }
    }

    /// Whether stage-2 work should be produced for this item.
    pub fn fans_out(&self) -> bool {
        matches!(self, Self::NoFactor)
    }

    /// Log headline for non-clean exits.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::NoFactor => "No factor found in step 1",
            Self::FactorFound => "Found factor in step 1:",
            Self::InputNumberFound => "Found input number N:",
            Self::Error { .. } => "Error while running GMP-ECM:",
        }
    }
}

/// Flags decoded from a stage-2 exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage2Exit {
    pub code: i32,
}

impl Stage2Exit {
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// The remaining cofactor is a probable prime, so sibling shards for the
    /// same number have nothing left to find.
    pub fn cofactor_prp(&self) -> bool {
        self.code & COFACTOR_PRP != 0 && self.code != INPUT_NUMBER_FOUND
    }

    pub fn factor_found(&self) -> bool {
        self.code & FACTOR_FOUND != 0
    }
}
