//! `qcr sampling` command - inspect the sampling plan

use miette::Result;

use crate::cli::output::{print_structured, print_table, Table};
use crate::cli::GlobalOpts;
use crate::core::{Config, ConfigError};
use crate::report::sampling::{SamplingRange, MIN_SUPPORTED_QUANTITY};

#[derive(clap::Args, Debug)]
pub struct SamplingArgs {
    /// Lot quantity to look up; omit to list every band
    pub quantity: Option<u64>,
}

pub fn run(args: SamplingArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load(global.config.as_deref())?;
    let table = config.sampling_table().map_err(ConfigError::from)?;

    let bands: Vec<&SamplingRange> = match args.quantity {
        Some(quantity) => {
            let band = table.lookup(quantity).ok_or_else(|| {
                miette::miette!(
                    code = "qcr::sampling::unsupported",
                    help = "Lots below the plan are inspected without a sampling table",
                    "Quantity {} is below the sampling plan minimum of {}",
                    quantity,
                    MIN_SUPPORTED_QUANTITY
                )
            })?;
            vec![band]
        }
        None => table.ranges().iter().collect(),
    };

    if print_structured(global.format, &bands)? {
        return Ok(());
    }

    let mut out = Table::new(&["LOT", "SAMPLE", "CRITICAL", "MAJOR", "MINOR", "COLUMN"]);
    for band in bands {
        out.push(vec![
            band.bounds_label(),
            band.sample_size.to_string(),
            band.critical_limit.to_string(),
            band.major_limit.to_string(),
            band.minor_limit.to_string(),
            band.column.clone(),
        ]);
    }
    print_table(global.format, &out)
}
