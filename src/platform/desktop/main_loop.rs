use std::path::Path;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{error, info, LevelFilter};

use crate::{
    error::{GooError, Result},
    floating_type_mod::FT,
    init_goo_sim,
    simulation_parameters::{load_scene_config, load_simulation_params, write_default_simulation_params},
    write_statistics,
};

use super::vtk_exporter::VtkExporter;

const CARGO_PKG_AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &'static str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &'static str = env!("CARGO_PKG_DESCRIPTION");

const DEFAULT_MAX_SECONDS: FT = 10.;

pub fn start() {
    let matches = App::new("Goo Simulation")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scene setup")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("MAX_SECONDS")
                        .long("max-seconds")
                        .short("s")
                        .required(false)
                        .takes_value(true)
                        .help("Stop simulation after the given amount of simulated seconds"),
                )
                .arg(
                    Arg::with_name("FRAME_DT")
                        .long("frame-dt")
                        .short("f")
                        .required(false)
                        .takes_value(true)
                        .help("Time that passes between two frames (defaults to the fixed time step)"),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("STATISTICS_PATH")
                        .long("statistics-path")
                        .short("w")
                        .required(false)
                        .takes_value(true)
                        .help("Where to write statistics to"),
                )
                .arg(
                    Arg::with_name("VTK_OUTPUT")
                        .long("vtk-output")
                        .short("o")
                        .required(false)
                        .takes_value(true)
                        .help("Folder to write a VTK snapshot of every frame to"),
                )
                .arg(
                    Arg::with_name("VTK_SDF")
                        .long("vtk-sdf")
                        .takes_value(false)
                        .requires("VTK_OUTPUT")
                        .help("Also export the distance field with every snapshot"),
                ),
        )
        .subcommand(
            SubCommand::with_name("write-default-config")
                .about("Write the default simulation parameters to a file")
                .arg(
                    Arg::with_name("OUTPUT_YAML")
                        .help("YAML file where the parameters are written to")
                        .default_value("./goo-params.yaml")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = if let Some(run_matches) = matches.subcommand_matches("run") {
        run(run_matches)
    } else if let Some(subcmd_matches) = matches.subcommand_matches("write-default-config") {
        let yaml_path = subcmd_matches.value_of("OUTPUT_YAML").unwrap_or("./goo-params.yaml");
        info!("Writing to file `{}`...", yaml_path);
        write_default_simulation_params(yaml_path)
    } else {
        unreachable!()
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_ft(matches: &ArgMatches, name: &str) -> Result<Option<FT>> {
    match matches.value_of(name) {
        Some(s) => s
            .parse::<FT>()
            .map(Some)
            .map_err(|_| GooError::InvalidParams(format!("`{}` is not a number", s))),
        None => Ok(None),
    }
}

fn run(run_matches: &ArgMatches) -> Result<()> {
    let parameter_file = run_matches.value_of("SIMULATION_CONFIG").unwrap_or_default();
    let overwrite_file = run_matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new);
    let simulation_params = load_simulation_params(parameter_file, overwrite_file)?;
    info!("{:?}", simulation_params);

    let scene_file_path = run_matches.value_of("SCENE_CONFIG").unwrap_or_default();
    let scene_config = load_scene_config(scene_file_path)?;
    info!("{:?}", scene_config);

    let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");
    let max_seconds = parse_ft(run_matches, "MAX_SECONDS")?.unwrap_or(DEFAULT_MAX_SECONDS);
    let frame_dt = parse_ft(run_matches, "FRAME_DT")?.unwrap_or(simulation_params.fixed_time_step);
    if !(frame_dt > 0.) {
        return Err(GooError::InvalidParams(format!("frame delta must be positive, got {}", frame_dt)));
    }

    let mut goo_simulation = init_goo_sim(simulation_params, &scene_config, counters_enabled)?;

    let mut vtk_exporter = match run_matches.value_of("VTK_OUTPUT") {
        Some(folder) => Some(VtkExporter::new(folder, "goo", run_matches.is_present("VTK_SDF"))?),
        None => None,
    };

    let mut frame_number: usize = 0;
    while goo_simulation.time() < max_seconds {
        let report = goo_simulation.advance(frame_dt);
        frame_number += 1;

        if report.substeps_run > 0 {
            if let Some(vtk_exporter) = &mut vtk_exporter {
                vtk_exporter.add_snapshot(&goo_simulation)?;
            }
        }

        if frame_number % 60 == 0 {
            info!(
                "frame {} t={:.2}s links={} surface links={} kinetic energy={:.4}",
                frame_number,
                goo_simulation.time(),
                goo_simulation.links().len(),
                goo_simulation.surface_links().len(),
                goo_simulation.total_kinetic_energy()
            );
        }
    }

    info!("finished after {} frames ({:.2}s simulated)", frame_number, goo_simulation.time());

    if counters_enabled {
        let s = write_statistics(&goo_simulation);
        print!("{}", s);
        if let Some(statistics_path) = run_matches.value_of("STATISTICS_PATH") {
            std::fs::write(statistics_path, s)?;
        }
    }

    Ok(())
}
