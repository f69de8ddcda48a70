#![cfg(feature = "web")]
use chrono::NaiveDate;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{AppError, AppResult};
use crate::inspection::{RovingStatus, StatusTier};
use crate::roving::{RovingRecord, parse_date, status_counts};

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Width of the image in pixels
    pub width: u32,
    /// Height of the image in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Roving Status".to_string(),
            x_label: "Status".to_string(),
            y_label: "Inspections".to_string(),
            width: 900,
            height: 500,
        }
    }
}

fn tier_color(tier: StatusTier) -> RGBColor {
    match tier {
        StatusTier::Green => RGBColor(34, 197, 94),
        StatusTier::Yellow => RGBColor(234, 179, 8),
        StatusTier::Red => RGBColor(220, 38, 38),
        StatusTier::Gray => RGBColor(156, 163, 175),
    }
}

fn chart_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::Internal(format!("chart rendering failed: {}", e))
}

/// Render into a temporary PNG file and read the bytes back
fn render_png<F>(options: &GraphOptions, draw: F) -> AppResult<Vec<u8>>
where
    F: FnOnce(&DrawingArea<BitMapBackend, plotters::coord::Shift>) -> AppResult<()>,
{
    let file = tempfile::Builder::new()
        .prefix("roving-chart")
        .suffix(".png")
        .tempfile()?;
    {
        let root =
            BitMapBackend::new(file.path(), (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        draw(&root)?;
        root.present().map_err(chart_err)?;
    }

    let mut buffer = Vec::new();
    file.reopen()?.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Bar chart of operator inspections per overall roving status
///
/// Bars are coloured by the status tier.
pub fn status_chart(records: &[RovingRecord], options: &GraphOptions) -> AppResult<Vec<u8>> {
    let counts: Vec<(RovingStatus, usize)> = status_counts(records);
    let labels: Vec<&'static str> = counts.iter().map(|(s, _)| s.as_str()).collect();
    let max_count = counts.iter().map(|(_, n)| *n).max().unwrap_or(0) as u32;

    render_png(options, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0i32..counts.len() as i32, 0u32..max_count + 1)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(counts.len())
            .x_label_formatter(&|x| labels.get(*x as usize).map(|l| l.to_string()).unwrap_or_default())
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(counts.iter().enumerate().map(|(i, (status, n))| {
                let x = i as i32;
                let mut bar = Rectangle::new(
                    [(x, 0), (x + 1, *n as u32)],
                    tier_color(status.tier()).filled(),
                );
                bar.set_margin(0, 0, 6, 6);
                bar
            }))
            .map_err(chart_err)?;
        Ok(())
    })
}

/// Share of rejected operator inspections per day, in percent
pub fn daily_reject_rates(records: &[RovingRecord]) -> Vec<(NaiveDate, f64)> {
    let mut per_day: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();
    for record in records {
        let Some(date) = parse_date(&record.inspection_date) else {
            continue;
        };
        let day = per_day.entry(date).or_default();
        for (_, entry) in record.entries() {
            day.0 += 1;
            if entry.overall_roving_status.is_reject() {
                day.1 += 1;
            }
        }
    }
    per_day
        .into_iter()
        .filter(|(_, (total, _))| *total > 0)
        .map(|(date, (total, rejects))| (date, rejects as f64 / total as f64 * 100.0))
        .collect()
}

/// Line chart of the daily reject rate
pub fn reject_trend_chart(records: &[RovingRecord], options: &GraphOptions) -> AppResult<Vec<u8>> {
    let data = daily_reject_rates(records);
    let (Some(first), Some(last)) = (data.first(), data.last()) else {
        return Err(AppError::not_found("No roving inspections in range"));
    };
    let start = first.0;
    let span = (last.0 - start).num_days() as i32 + 1;
    let points: Vec<(i32, f64)> = data
        .iter()
        .map(|(d, r)| ((*d - start).num_days() as i32, *r))
        .collect();

    render_png(options, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..span, 0f64..100f64)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_label_formatter(&|x| {
                (start + chrono::Duration::days(*x as i64))
                    .format("%m/%d")
                    .to_string()
            })
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(LineSeries::new(points.iter().copied(), &RED))
            .map_err(chart_err)?;
        chart
            .draw_series(points.iter().map(|&(d, r)| Circle::new((d, r), 3, RED.filled())))
            .map_err(chart_err)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roving::{InspectionRep, RovingEntry};

    fn record(date: &str, statuses: &[RovingStatus]) -> RovingRecord {
        RovingRecord {
            inline_roving_id: 1,
            report_name: String::new(),
            inspection_date: date.to_string(),
            mo_no: "GPCO1".to_string(),
            line_no: "1".to_string(),
            buyer_name: String::new(),
            inspection_rep: vec![InspectionRep {
                inline_data: statuses
                    .iter()
                    .map(|s| RovingEntry {
                        overall_roving_status: *s,
                        ..RovingEntry::default()
                    })
                    .collect(),
                ..InspectionRep::default()
            }],
        }
    }

    #[test]
    fn reject_rates_per_day() {
        let records = vec![
            record("3/8/2025", &[RovingStatus::Pass, RovingStatus::RejectMinorSingle]),
            record("03/07/2025", &[RovingStatus::Pass, RovingStatus::Pending]),
            record("03/08/2025", &[RovingStatus::RejectCritical, RovingStatus::Pass]),
            record("not a date", &[RovingStatus::Reject]),
        ];
        let rates = daily_reject_rates(&records);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0], (NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(), 0.0));
        assert_eq!(rates[1], (NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(), 50.0));
    }

    #[test]
    fn empty_trend_is_not_found() {
        let result = reject_trend_chart(&[], &GraphOptions::default());
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
