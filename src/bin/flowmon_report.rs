use env_logger::Env;
use flowmon_lcr::report::parse_cli;
use flowmon_lcr::{FlowMonReport, CSV_DIR, PLOT_FILE};
use log::info;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let (xml_file, csv_name) = parse_cli();
    info!("reading flow report from {}", xml_file.to_str().unwrap());
    let report = FlowMonReport::from_xml(&xml_file).unwrap();
    let stats = report.analyze().unwrap();
    stats.plot_ratios(Path::new(PLOT_FILE)).unwrap();
    info!("saved the ratio chart to {}", PLOT_FILE);
    if let Some(name) = csv_name {
        stats.append_csv(&name).unwrap();
        info!(
            "appended {} ratios to {}/{}.csv",
            stats.ratios.len(),
            CSV_DIR,
            name
        );
    }
}
