use super::VERSION;
use clap::{App, Arg};
use std::path::PathBuf;

/// Takes the CLI arguments for the flow report analysis.
pub fn parse_cli() -> (PathBuf, Option<String>) {
    let arg_xml = Arg::with_name("xml_file")
        .help("path to the FlowMonitor xml report")
        .required(true)
        .index(1);
    let arg_csv = Arg::with_name("csv_name")
        .help("basename for the csv file appended under summarizedData/")
        .index(2);
    let cli_args = App::new("Flowmon_report")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to compute the lost clients ratio from a FlowMonitor report")
        .arg(arg_xml)
        .arg(arg_csv)
        .get_matches();
    let xml_file = PathBuf::from(cli_args.value_of("xml_file").unwrap());
    let csv_name = cli_args.value_of("csv_name").map(String::from);
    return (xml_file, csv_name);
}
