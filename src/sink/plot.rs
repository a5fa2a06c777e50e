use std::collections::VecDeque;
use std::io::Write;

use chrono::{DateTime, Local};

use crate::{error::SinkError, measurement::Measurement, sink::Sink};

pub const SERIES: [&str; 2] = ["pm2.5", "pm10"];

pub type Point = (DateTime<Local>, f32);

/// Drawing surface for a two-series time chart.
pub trait Canvas: Send {
    fn draw_legend(&mut self, names: &[&str]) -> Result<(), SinkError>;

    fn draw_series(&mut self, name: &str, points: &[Point]) -> Result<(), SinkError>;

    fn present(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: DateTime<Local>,
    pm2_5: f32,
    pm10: f32,
}

#[derive(Debug)]
pub struct PlotSink<C: Canvas> {
    canvas: C,
    history: VecDeque<Sample>,
    capacity: Option<usize>,
    legend_drawn: bool,
}

impl<C: Canvas> PlotSink<C> {
    /// `capacity` bounds the history, dropping the oldest points; `None` keeps everything.
    pub fn new(canvas: C, capacity: Option<usize>) -> Self {
        PlotSink {
            canvas,
            history: VecDeque::new(),
            capacity,
            legend_drawn: false,
        }
    }

    pub fn pm2_5_series(&self) -> Vec<Point> {
        self.history.iter().map(|s| (s.timestamp, s.pm2_5)).collect()
    }

    pub fn pm10_series(&self) -> Vec<Point> {
        self.history.iter().map(|s| (s.timestamp, s.pm10)).collect()
    }

    #[cfg(test)]
    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    fn redraw(&mut self) -> Result<(), SinkError> {
        if !self.legend_drawn {
            self.canvas.draw_legend(&SERIES)?;
            self.legend_drawn = true;
        }
        let pm2_5 = self.pm2_5_series();
        let pm10 = self.pm10_series();
        self.canvas.draw_series(SERIES[0], &pm2_5)?;
        self.canvas.draw_series(SERIES[1], &pm10)?;
        self.canvas.present()
    }
}

impl<C: Canvas> Sink for PlotSink<C> {
    fn name(&self) -> &str {
        "plot"
    }

    fn consume(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        self.history.push_back(Sample {
            timestamp: measurement.timestamp,
            pm2_5: measurement.pm2_5,
            pm10: measurement.pm10,
        });
        if let Some(capacity) = self.capacity {
            while self.history.len() > capacity {
                self.history.pop_front();
            }
        }

        self.redraw()
    }
}

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Renders each series as a sparkline of its most recent `width` points.
#[derive(Debug)]
pub struct TerminalCanvas<W: Write> {
    out: W,
    width: usize,
    span: Option<(DateTime<Local>, DateTime<Local>)>,
}

impl<W: Write> TerminalCanvas<W> {
    pub fn new(out: W, width: usize) -> Self {
        TerminalCanvas {
            out,
            width: width.max(1),
            span: None,
        }
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

pub fn sparkline(values: &[f32]) -> String {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range > 0.0 {
                BARS[(((v - min) / range) * (BARS.len() - 1) as f32).round() as usize]
            } else {
                BARS[0]
            }
        })
        .collect()
}

impl<W: Write + Send> Canvas for TerminalCanvas<W> {
    fn draw_legend(&mut self, names: &[&str]) -> Result<(), SinkError> {
        writeln!(self.out, "legend: {} (µg/m³)", names.join(", "))?;
        Ok(())
    }

    fn draw_series(&mut self, name: &str, points: &[Point]) -> Result<(), SinkError> {
        let visible = &points[points.len().saturating_sub(self.width)..];
        let (Some(first), Some(last)) = (visible.first(), visible.last()) else {
            return Ok(());
        };
        self.span = Some((first.0, last.0));

        let values: Vec<f32> = visible.iter().map(|p| p.1).collect();
        writeln!(self.out, "{name:>6} {} {:.1}", sparkline(&values), last.1)?;
        Ok(())
    }

    fn present(&mut self) -> Result<(), SinkError> {
        if let Some((from, to)) = self.span.take() {
            writeln!(
                self.out,
                "{:>6} {} .. {}",
                "t",
                from.format("%H:%M:%S"),
                to.format("%H:%M:%S")
            )?;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::measurement;

    #[derive(Default)]
    struct RecordingCanvas {
        legends: usize,
        frames: usize,
        last: Vec<(String, Vec<f32>)>,
    }

    impl Canvas for RecordingCanvas {
        fn draw_legend(&mut self, _: &[&str]) -> Result<(), SinkError> {
            self.legends += 1;
            Ok(())
        }

        fn draw_series(&mut self, name: &str, points: &[Point]) -> Result<(), SinkError> {
            self.last
                .push((name.to_string(), points.iter().map(|p| p.1).collect()));
            Ok(())
        }

        fn present(&mut self) -> Result<(), SinkError> {
            self.frames += 1;
            Ok(())
        }
    }

    fn values(points: &[Point]) -> Vec<f32> {
        points.iter().map(|p| p.1).collect()
    }

    #[test]
    fn test_series_follow_records_in_order() {
        let mut plot = PlotSink::new(RecordingCanvas::default(), None);
        let records = [(1.0, 10.0), (2.5, 20.5), (0.5, 5.0), (3.0, 30.0)];

        for (i, &(pm2_5, pm10)) in records.iter().enumerate() {
            plot.consume(&measurement(i as i64, pm2_5, pm10)).unwrap();
        }

        assert_eq!(plot.pm2_5_series().len(), 4);
        assert_eq!(plot.pm10_series().len(), 4);
        assert_eq!(values(&plot.pm2_5_series()), vec![1.0, 2.5, 0.5, 3.0]);
        assert_eq!(values(&plot.pm10_series()), vec![10.0, 20.5, 5.0, 30.0]);
        let timestamps: Vec<_> = plot.pm2_5_series().iter().map(|p| p.0.timestamp()).collect();
        assert_eq!(timestamps, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_legend_drawn_once() {
        let mut plot = PlotSink::new(RecordingCanvas::default(), None);

        for i in 0..50 {
            plot.consume(&measurement(i, 1.0, 2.0)).unwrap();
        }

        assert_eq!(plot.canvas().legends, 1);
        assert_eq!(plot.canvas().frames, 50);
    }

    #[test]
    fn test_redraw_uses_both_series_names() {
        let mut plot = PlotSink::new(RecordingCanvas::default(), None);
        plot.consume(&measurement(0, 1.0, 2.0)).unwrap();

        let names: Vec<_> = plot.canvas().last.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["pm2.5", "pm10"]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut plot = PlotSink::new(RecordingCanvas::default(), Some(3));

        for i in 0..5 {
            plot.consume(&measurement(i, i as f32, 0.0)).unwrap();
        }

        assert_eq!(values(&plot.pm2_5_series()), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sparkline_scales_to_range() {
        assert_eq!(sparkline(&[0.0, 7.0]), "▁█");
        assert_eq!(sparkline(&[5.0, 5.0, 5.0]), "▁▁▁");
        assert_eq!(sparkline(&[]), "");
    }

    #[test]
    fn test_terminal_canvas_legend_once() {
        let mut plot = PlotSink::new(TerminalCanvas::new(Vec::new(), 10), None);

        for i in 0..3 {
            plot.consume(&measurement(i, 1.0 + i as f32, 2.0)).unwrap();
        }

        let out = String::from_utf8(plot.canvas().get_ref().clone()).unwrap();
        assert_eq!(out.matches("legend:").count(), 1);
        assert_eq!(out.lines().filter(|l| l.trim_start().starts_with("pm2.5")).count(), 3);
    }
}
