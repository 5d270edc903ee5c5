//! Electricity-consumption data behind the dashboard charts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

const COLUMNS: [&str; 4] = ["dwelling_type_id", "year", "kwh_per_acc", "area"];
const SYNTHETIC_AREAS: [&str; 5] = ["Central", "North", "South", "East", "West"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionRecord {
    pub dwelling_type_id: u32,
    pub year: i32,
    pub kwh_per_acc: f64,
    pub area: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DashboardQuery {
    pub dwelling_type: Option<u32>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellingOption {
    pub value: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub kwh_per_acc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaAverage {
    pub area: String,
    pub kwh_per_acc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub dwelling_types: Vec<DwellingOption>,
    pub year_min: i32,
    pub year_max: i32,
    pub selected_dwelling_type: u32,
    pub selected_label: String,
    pub year_range: [i32; 2],
    pub trend: Vec<TrendPoint>,
    pub area_averages: Vec<AreaAverage>,
}

pub fn dwelling_label(id: u32) -> String {
    match id {
        1 => "1-room / 2-room".to_string(),
        2 => "Private Apartments and Condominiums".to_string(),
        3 => "Landed Properties".to_string(),
        4 => "5-room and Executive".to_string(),
        5 => "3-room".to_string(),
        6 => "4-room".to_string(),
        other => format!("Type {other}"),
    }
}

#[derive(Debug, Clone)]
pub struct ConsumptionDataset {
    records: Vec<ConsumptionRecord>,
}

impl ConsumptionDataset {
    /// Reads the CSV at `path`, falling back to [`ConsumptionDataset::synthetic`] when
    /// the file does not exist. Other I/O failures are returned.
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let dataset = Self::parse_csv(&raw)?;
                log::info!(
                    "loaded {} consumption rows from {}",
                    dataset.records.len(),
                    path.display()
                );
                Ok(dataset)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "{} not found; using the built-in sample dataset",
                    path.display()
                );
                Ok(Self::synthetic())
            }
            Err(e) => Err(e),
        }
    }

    /// The 60-row sample used when no CSV is available.
    pub fn synthetic() -> Self {
        let records = (0..60usize)
            .map(|i| ConsumptionRecord {
                dwelling_type_id: (i % 6) as u32 + 1,
                year: 2020 + (i % 5) as i32,
                kwh_per_acc: 100.0 + 50.0 * (i % 6) as f64,
                area: SYNTHETIC_AREAS[i % 5].to_string(),
            })
            .collect();
        Self { records }
    }

    /// Parses a header-led CSV. Columns are located by name; rows that do not parse
    /// are skipped with a warning.
    pub fn parse_csv(raw: &str) -> io::Result<Self> {
        let mut lines = raw.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty CSV"))?;
        let headers: Vec<String> = split_row(header)
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();

        let mut index = [0usize; 4];
        for (slot, column) in index.iter_mut().zip(COLUMNS) {
            *slot = headers.iter().position(|h| h == column).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("CSV is missing column '{column}'"),
                )
            })?;
        }

        let mut records = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let cells = split_row(line);
            let cell = |i: usize| cells.get(index[i]).map(String::as_str).unwrap_or("");
            let parsed = (|| {
                Some(ConsumptionRecord {
                    dwelling_type_id: cell(0).parse().ok()?,
                    year: cell(1).parse().ok()?,
                    kwh_per_acc: cell(2).parse().ok().filter(|v: &f64| v.is_finite())?,
                    area: cell(3).to_string(),
                })
            })();
            match parsed {
                Some(record) => records.push(record),
                None => log::warn!("skipping malformed CSV row {}: {line}", line_no + 2),
            }
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[ConsumptionRecord] {
        &self.records
    }

    pub fn dwelling_types(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.records.iter().map(|r| r.dwelling_type_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let min = self.records.iter().map(|r| r.year).min()?;
        let max = self.records.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// Trend and per-area averages for one dwelling type within a year range.
    pub fn view(&self, query: DashboardQuery) -> DashboardView {
        let (year_min, year_max) = self.year_bounds().unwrap_or((2020, 2024));
        let selected = query
            .dwelling_type
            .or_else(|| self.records.first().map(|r| r.dwelling_type_id))
            .unwrap_or(1);
        let from = query.year_from.unwrap_or(year_min);
        let to = query.year_to.unwrap_or(year_max);

        let filtered: Vec<&ConsumptionRecord> = self
            .records
            .iter()
            .filter(|r| r.dwelling_type_id == selected && (from..=to).contains(&r.year))
            .collect();

        let trend = filtered
            .iter()
            .map(|r| TrendPoint {
                year: r.year,
                kwh_per_acc: r.kwh_per_acc,
            })
            .collect();

        let mut by_area: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
        for record in &filtered {
            let entry = by_area.entry(record.area.as_str()).or_insert((0.0, 0));
            entry.0 += record.kwh_per_acc;
            entry.1 += 1;
        }
        let area_averages = by_area
            .into_iter()
            .map(|(area, (sum, count))| AreaAverage {
                area: area.to_string(),
                kwh_per_acc: sum / f64::from(count),
            })
            .collect();

        DashboardView {
            dwelling_types: self
                .dwelling_types()
                .into_iter()
                .map(|value| DwellingOption {
                    value,
                    label: dwelling_label(value),
                })
                .collect(),
            year_min,
            year_max,
            selected_dwelling_type: selected,
            selected_label: dwelling_label(selected),
            year_range: [from, to],
            trend,
            area_averages,
        }
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').trim().to_string())
        .collect()
}
