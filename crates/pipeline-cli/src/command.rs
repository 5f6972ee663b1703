//! Command-line parsing

use anyhow::{bail, Context, Result};
use degradation_model::{Adjustment, WhatIfScenario};
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: tire-pipeline <command>

Commands:
  prepare [out_dir]                      Build training data (default out_dir: data/prepared)
  predict <lap_id>                       Predict degradation for one lap
  what-if <lap_id> <kind>=<amount>...    Compare a lap against adjusted driving inputs
  importance                             Rank model features

Adjustment kinds: brake_pressure, steering_smoothness, cornering_speed,
throttle_application (percent), track_temperature, air_temperature (degrees)";

const DEFAULT_OUT_DIR: &str = "data/prepared";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Prepare { out_dir: PathBuf },
    Predict { lap_id: i64 },
    WhatIf { lap_id: i64, scenario: WhatIfScenario },
    Importance,
}

impl Command {
    /// Parse arguments, excluding the program name
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            bail!("Missing command\n\n{}", USAGE);
        };

        match name.as_str() {
            "prepare" => {
                let out_dir = args.next().unwrap_or_else(|| DEFAULT_OUT_DIR.to_string());
                Ok(Command::Prepare {
                    out_dir: PathBuf::from(out_dir),
                })
            }
            "predict" => Ok(Command::Predict {
                lap_id: lap_id(args.next())?,
            }),
            "what-if" => {
                let lap_id = lap_id(args.next())?;
                let adjustments = args
                    .map(|a| a.parse::<Adjustment>())
                    .collect::<Result<Vec<_>, _>>()?;
                if adjustments.is_empty() {
                    bail!("what-if needs at least one <kind>=<amount> adjustment");
                }
                Ok(Command::WhatIf {
                    lap_id,
                    scenario: WhatIfScenario::new(adjustments)?,
                })
            }
            "importance" => Ok(Command::Importance),
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        }
    }
}

fn lap_id(arg: Option<String>) -> Result<i64> {
    let arg = arg.context("Missing <lap_id>")?;
    arg.parse()
        .with_context(|| format!("Invalid lap id: {}", arg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use degradation_model::AdjustmentKind;

    fn parse(args: &[&str]) -> Result<Command> {
        Command::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_prepare_default_dir() {
        assert_eq!(
            parse(&["prepare"]).unwrap(),
            Command::Prepare {
                out_dir: PathBuf::from("data/prepared")
            }
        );
    }

    #[test]
    fn test_what_if() {
        let Command::WhatIf { lap_id, scenario } =
            parse(&["what-if", "812", "brake_pressure=-20", "track_temperature=5"]).unwrap()
        else {
            panic!("expected what-if");
        };
        assert_eq!(lap_id, 812);
        assert_eq!(scenario.adjustments().len(), 2);
        assert_eq!(
            scenario.get(AdjustmentKind::BrakePressure).map(|a| a.amount()),
            Some(-20.0)
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["train"]).is_err());
        assert!(parse(&["predict"]).is_err());
        assert!(parse(&["predict", "lap-3"]).is_err());
        assert!(parse(&["what-if", "3"]).is_err());
        assert!(parse(&["what-if", "3", "brake_pressure=-50"]).is_err());
        assert!(parse(&["what-if", "3", "brake_pressure=-5", "brake_pressure=5"]).is_err());
    }
}
