use fringe_demod::config::demod;
use fringe_demod::demod::gabor::phase_field;
use fringe_demod::image::io::{
    load_interferogram, save_field_png, save_mask_png, write_json_file,
};
use fringe_demod::params::StrategyKind;
use fringe_demod::DemodRun;
use std::env;
use std::path::Path;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = demod::load_config(Path::new(&config_path))?;

    let image = load_interferogram(&config.input)?;
    let mut run = match &config.quality_image {
        Some(path) => {
            let quality = load_interferogram(path)?;
            DemodRun::with_quality(image, quality, config.params.clone())
        }
        None => DemodRun::new(image, config.params.clone()),
    }
    .map_err(|e| e.to_string())?;
    let report = run.run_to_completion().map_err(|e| e.to_string())?;

    let fields = run.fields();
    // The tracker keeps unwrapped phase; re-wrap it through the response.
    let wrapped = match config.params.strategy {
        StrategyKind::Tracker => phase_field(&fields.re, &fields.im),
        _ => fields.phase.clone(),
    };
    save_field_png(&wrapped, &config.output.phase_image)?;
    if let Some(path) = &config.output.fx_image {
        save_field_png(&fields.fx, path)?;
    }
    if let Some(path) = &config.output.fy_image {
        save_field_png(&fields.fy, path)?;
    }
    if let Some(path) = &config.output.mask_image {
        save_mask_png(&fields.demodulated, path)?;
    }
    write_json_file(&config.output.report_json, &report)?;

    println!(
        "Demodulated {}/{} pixels from seed ({}, {}) in {:.1} ms",
        report.demodulated,
        report.width * report.height,
        report.seed.x,
        report.seed.y,
        report.timings.total_ms
    );
    println!(
        "Saved phase to {} and report to {}",
        config.output.phase_image.display(),
        config.output.report_json.display()
    );

    Ok(())
}

fn usage() -> String {
    "Usage: fringe_demod <config.json>".to_string()
}
