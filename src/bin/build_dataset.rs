use std::path::Path;

use ambient_features::{
    init_logging, load_driver_config, log_run_start, log_run_summary, logging_config_from_env,
    read_stream_set, run_pipeline, write_table_csv, DriverConfig, Period,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let config_arg = std::env::args().nth(1);
    let cfg = match config_arg.as_deref() {
        Some(path) => load_driver_config(Path::new(path))?,
        None => DriverConfig::default(),
    };
    log_run_start(&logging_cfg, config_arg.as_deref().unwrap_or("defaults"));

    let streams = read_stream_set(&cfg.data_dir, &cfg.files)?;
    let output = run_pipeline(&streams, &cfg.pipeline)?;
    log_run_summary(&output);

    println!(
        "Sampling floor: {}",
        Period::from_seconds(output.floor.floor_seconds)
            .map(|p| p.to_string())
            .unwrap_or_else(|_| "0s".to_string())
    );
    println!(
        "Windows: {}",
        output
            .windows
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    for (alias, table) in &output.tables {
        let path = cfg.output_path(alias);
        write_table_csv(&path, table)?;
        println!("{alias}: {} rows -> {}", table.len(), path.display());
    }

    if let Some(joined) = &output.joined {
        match joined {
            Ok(table) => {
                let path = cfg.joined_output_path();
                write_table_csv(&path, table)?;
                println!("joined: {} rows -> {}", table.len(), path.display());
            }
            Err(err) => eprintln!("joined: {err}"),
        }
    }

    for (alias, err) in &output.failures {
        eprintln!("{alias}: {err}");
    }

    let join_failed = matches!(output.joined, Some(Err(_)));
    if !output.failures.is_empty() || join_failed {
        return Err(format!(
            "{} alias(es) failed{}",
            output.failures.len(),
            if join_failed { ", join failed" } else { "" }
        )
        .into());
    }

    Ok(())
}
