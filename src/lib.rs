use log::debug;
use plotters::prelude::*;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
pub mod report;

pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// source port of the echo server flows, excluded from the client population
pub const SERVER_PORT: &str = "9";
/// number of flow records processed before the analysis stops
pub const MAX_FLOWS: usize = 30;
/// first node number for which a lost clients ratio is recorded
pub const RATIO_START_NODE: usize = 2;
pub const PLOT_FILE: &str = "Lost_Clients_Ratio.png";
pub const CSV_DIR: &str = "summarizedData";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not read the report file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse the report xml: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Flow element is missing attribute {0}")]
    MissingAttribute(&'static str),
    #[error("attribute {attribute}=\"{value}\" is not a valid number")]
    InvalidNumber {
        attribute: &'static str,
        value: String,
    },
}

/// A single flow record from FlowStats, counters as written by the simulation.
/// delaySum keeps its unit suffix and is only parsed during the analysis.
#[derive(Debug, Clone)]
pub struct FlowRecord {
    pub flow_id: String,
    pub tx_bytes: f64,
    pub rx_bytes: f64,
    pub tx_packets: i64,
    pub rx_packets: i64,
    pub delay_sum: String,
    pub lost_packets: i64,
}

impl FlowRecord {
    fn from_node(node: roxmltree::Node) -> Result<FlowRecord, ReportError> {
        Ok(FlowRecord {
            flow_id: req_attr(node, "flowId")?,
            tx_bytes: req_attr_f64(node, "txBytes")?,
            rx_bytes: req_attr_f64(node, "rxBytes")?,
            tx_packets: req_attr_i64(node, "txPackets")?,
            rx_packets: req_attr_i64(node, "rxPackets")?,
            delay_sum: req_attr(node, "delaySum")?,
            lost_packets: req_attr_i64(node, "lostPackets")?,
        })
    }
}

/// Address and port identity of a flow, from Ipv4FlowClassifier
#[derive(Debug, Clone)]
pub struct ClassifierRecord {
    pub flow_id: String,
    pub source_address: String,
    pub source_port: String,
    pub destination_address: String,
    pub destination_port: String,
}

impl ClassifierRecord {
    fn from_node(node: roxmltree::Node) -> Result<ClassifierRecord, ReportError> {
        Ok(ClassifierRecord {
            flow_id: req_attr(node, "flowId")?,
            source_address: req_attr(node, "sourceAddress")?,
            source_port: req_attr(node, "sourcePort")?,
            destination_address: req_attr(node, "destinationAddress")?,
            destination_port: req_attr(node, "destinationPort")?,
        })
    }
}

fn req_attr(node: roxmltree::Node, name: &'static str) -> Result<String, ReportError> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or(ReportError::MissingAttribute(name))
}

fn req_attr_f64(node: roxmltree::Node, name: &'static str) -> Result<f64, ReportError> {
    let value = req_attr(node, name)?;
    value.parse().map_err(|_| ReportError::InvalidNumber {
        attribute: name,
        value,
    })
}

fn req_attr_i64(node: roxmltree::Node, name: &'static str) -> Result<i64, ReportError> {
    let value = req_attr(node, name)?;
    value.parse().map_err(|_| ReportError::InvalidNumber {
        attribute: name,
        value,
    })
}

/// The two record lists of a FlowMonitor report, in document order
#[derive(Debug, Clone)]
pub struct FlowMonReport {
    pub flows: Vec<FlowRecord>,
    pub classifiers: Vec<ClassifierRecord>,
}

impl FlowMonReport {
    pub fn from_xml(path: &Path) -> Result<FlowMonReport, ReportError> {
        let text = std::fs::read_to_string(path)?;
        FlowMonReport::parse(&text)
    }

    /// Materializes the records under FlowStats and Ipv4FlowClassifier.
    /// Missing or non-numeric attributes fail here, before the analysis runs.
    pub fn parse(text: &str) -> Result<FlowMonReport, ReportError> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();
        let mut flows = Vec::new();
        let mut classifiers = Vec::new();
        for section in root.children().filter(|n| n.has_tag_name("FlowStats")) {
            for node in section.children().filter(|n| n.has_tag_name("Flow")) {
                flows.push(FlowRecord::from_node(node)?);
            }
        }
        for section in root.children().filter(|n| n.has_tag_name("Ipv4FlowClassifier")) {
            for node in section.children().filter(|n| n.has_tag_name("Flow")) {
                classifiers.push(ClassifierRecord::from_node(node)?);
            }
        }
        debug!(
            "parsed {} flow records and {} classifier records",
            flows.len(),
            classifiers.len()
        );
        Ok(FlowMonReport { flows, classifiers })
    }

    /// Walks the flows in document order, joins each to its classifier,
    /// prints the per-flow diagnostics and accumulates the lost clients
    /// ratio series, one entry per flow from the second one onward.
    /// Stops after MAX_FLOWS flows, remaining records are ignored.
    pub fn analyze(&self) -> Result<LostClientStats, ReportError> {
        let mut total_clients: usize = 0;
        let mut lost_clients: HashSet<String> = HashSet::new();
        let mut client_count: usize = 0;
        let mut ratios: Vec<f64> = Vec::new();

        // a flow without a classifier match keeps the address and port
        // values of the previous iteration, empty before the first match
        let mut src_addr = String::new();
        let mut src_port = String::new();
        let mut dst_addr = String::new();
        let mut dst_port = String::new();

        for flow in &self.flows {
            if let Some(c) = self
                .classifiers
                .iter()
                .find(|c| c.flow_id == flow.flow_id)
            {
                src_addr = c.source_address.clone();
                src_port = c.source_port.clone();
                dst_addr = c.destination_address.clone();
                dst_port = c.destination_port.clone();
            }
            println!(
                "Flow {} ({}/{} --> {}/{}): ",
                flow.flow_id, src_addr, src_port, dst_addr, dst_port
            );
            if src_port != SERVER_PORT {
                total_clients += 1;
            }
            println!("\tNumber of transmitted packets: {}", flow.tx_packets);
            println!("\tNumber of received packets: {}", flow.rx_packets);
            match mean_delay_secs(&flow.delay_sum, flow.rx_packets)? {
                Some(d) => println!("\tMean Delay: {:.2} ms", d * 1e3),
                None => println!("\tMean Delay: None"),
            }
            if flow.lost_packets != 0 {
                lost_clients.insert(src_addr.clone());
            }
            if flow.tx_packets == 0 {
                panic!(
                    "flow {}: division by zero, no transmitted packets",
                    flow.flow_id
                );
            }
            let packet_loss_ratio =
                (flow.tx_packets - flow.rx_packets) as f64 / flow.tx_packets as f64 * 100.;
            println!("\tPacket Loss Ratio: {:.2} %", packet_loss_ratio);

            client_count += 1;
            if client_count >= RATIO_START_NODE {
                if total_clients == 0 {
                    panic!(
                        "division by zero, no client flows among the first {}",
                        client_count
                    );
                }
                let lost_client_ratio = lost_clients.len() as f64 / total_clients as f64 * 100.;
                ratios.push(lost_client_ratio);
                println!(
                    "Lost Clients Ratio (Node {}): {:.2}% ({}/{})",
                    client_count,
                    lost_client_ratio,
                    lost_clients.len(),
                    total_clients
                );
            }
            if client_count == MAX_FLOWS {
                break;
            }
        }

        let addresses: Vec<&String> = lost_clients.iter().collect();
        println!("Lost clients: {:?}", addresses);
        Ok(LostClientStats {
            total_clients,
            lost_clients,
            client_count,
            ratios,
        })
    }
}

/// Strips the two-character unit suffix from a FlowMonitor duration
/// and parses the remainder as nanoseconds
pub fn parse_delay_sum_ns(raw: &str) -> Result<f64, ReportError> {
    let digits = &raw[..raw.len().saturating_sub(2)];
    digits.parse().map_err(|_| ReportError::InvalidNumber {
        attribute: "delaySum",
        value: raw.to_string(),
    })
}

/// Mean per-packet delay in seconds, None when no packets were received.
/// The delay sum is parsed either way, a malformed value fails here.
pub fn mean_delay_secs(delay_sum: &str, rx_packets: i64) -> Result<Option<f64>, ReportError> {
    let ns = parse_delay_sum_ns(delay_sum)?;
    if rx_packets == 0 {
        Ok(None)
    } else {
        Ok(Some(ns / rx_packets as f64 * 1e-9))
    }
}

/// Aggregates of the analysis loop, read back for plotting and export
#[derive(Debug, Clone)]
pub struct LostClientStats {
    pub total_clients: usize,
    pub lost_clients: HashSet<String>,
    pub client_count: usize,
    pub ratios: Vec<f64>,
}

impl LostClientStats {
    /// plots the ratio series against the node numbers to a png
    pub fn plot_ratios(&self, fout: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let (ymin, ymax) = if self.ratios.is_empty() {
            (0., 100.)
        } else {
            min_and_max(&self.ratios[..])
        };
        let mut yspan = (ymax - ymin) / 10f64;
        if yspan == 0. {
            yspan = 1.;
        }
        let ymin = ymin - yspan;
        let ymax = ymax + yspan;
        let xmin = RATIO_START_NODE as i32 - 1;
        let xmax = self.client_count.max(RATIO_START_NODE) as i32 + 1;
        let root = BitMapBackend::new(fout, (1000, 600)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption("Lost Clients Ratio by Node Number", ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(xmin..xmax, ymin..ymax)?;
        chart
            .configure_mesh()
            .label_style(("sans-serif", 20))
            .x_desc("Node Number")
            .y_desc("Lost Clients Ratio (%)")
            .draw()?;
        let points: Vec<(i32, f64)> = (RATIO_START_NODE..)
            .zip(self.ratios.iter())
            .map(|(n, &r)| (n as i32, r))
            .collect();
        chart.draw_series(LineSeries::new(
            points.iter().copied(),
            BLUE.stroke_width(2),
        ))?;
        chart.draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 8, RED.filled())))?;
        Ok(())
    }

    /// appends the ratio series under the fixed csv directory,
    /// one value per line with two decimals
    pub fn append_csv(&self, name: &str) -> std::io::Result<()> {
        self.append_csv_under(Path::new(CSV_DIR), name)
    }

    pub fn append_csv_under(&self, dir: &Path, name: &str) -> std::io::Result<()> {
        let fout = dir.join(format!("{}.csv", name));
        let file = OpenOptions::new().append(true).create(true).open(fout)?;
        let mut buf = BufWriter::new(file);
        for ratio in &self.ratios {
            writeln!(buf, "{:.2}", ratio)?;
        }
        buf.flush()
    }
}

fn min_and_max(s: &[f64]) -> (f64, f64) {
    let mut min = s[0];
    let mut max = s[0];
    for &v in &s[1..] {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}
