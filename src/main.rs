use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rowdp::{improve_placement, ImproveParams};

#[derive(Clone, Debug)]
struct Config {
    input_file: PathBuf,
    output_file: PathBuf,
    params: ImproveParams,
}

fn parse_args() -> Result<Config> {
    use clap::{App, Arg};
    let matches = App::new("rowdp")
        .version(env!("CARGO_PKG_VERSION"))
        .author(clap::crate_authors!())
        .about("Row-based detailed placement improvement")
        .arg(
            Arg::with_name("SEED")
                .long("seed")
                .value_name("SEED")
                .help("Seed for the randomized improvement passes")
                .default_value("1"),
        )
        .arg(
            Arg::with_name("MAX_DISP_X")
                .long("max-disp-x")
                .value_name("DIST")
                .help("Maximum horizontal displacement, in layout units"),
        )
        .arg(
            Arg::with_name("MAX_DISP_Y")
                .long("max-disp-y")
                .value_name("DIST")
                .help("Maximum vertical displacement, in layout units"),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("Input block, as JSON")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Output file location")
                .index(2)
                .required(true),
        )
        .get_matches();

    let parse_disp = |name: &str| -> Result<Option<i32>> {
        matches
            .value_of(name)
            .map(|v| {
                v.parse()
                    .with_context(|| anyhow!("Parsing {} argument", name))
            })
            .transpose()
    };

    Ok(Config {
        input_file: PathBuf::from(matches.value_of_os("INPUT").unwrap()),
        output_file: PathBuf::from(matches.value_of_os("OUTPUT").unwrap()),
        params: ImproveParams {
            seed: matches
                .value_of("SEED")
                .ok_or_else(|| -> ! { unreachable!() })?
                .parse()
                .with_context(|| anyhow!("Parsing seed argument"))?,
            max_disp_x: parse_disp("MAX_DISP_X")?,
            max_disp_y: parse_disp("MAX_DISP_Y")?,
            script: None,
        },
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = parse_args()?;

    let mut db = {
        let inf = std::fs::File::open(&config.input_file)
            .with_context(|| anyhow!("Opening input file {:?}", config.input_file))?;
        serde_json::from_reader(std::io::BufReader::new(inf))
            .with_context(|| anyhow!("Parsing input file {:?}", config.input_file))?
    };

    let report = improve_placement(&mut db, &config.params)?;
    if !report.skipped {
        println!(
            "hpwl {} -> {} ({:+.2}%)",
            report.hpwl_before,
            report.hpwl_after,
            -report.delta_pct()
        );
    }

    {
        let outf = std::fs::File::create(&config.output_file)
            .with_context(|| anyhow!("Creating output file {:?}", config.output_file))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(outf), &db)
            .with_context(|| anyhow!("Writing output file {:?}", config.output_file))?;
    }

    Ok(())
}
