use crate::rollup::Rollup;
use crate::window::{FrameFps, PollSummary};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::warn;

const FRAME_HEADER: &str = "FPS, FrameIndex, NumFramePresents, NumMisPresented, NumDroppedFrames\
, ReprojectionMotion, PredictedFrames, ThrottledFrames\
, SystemTimeInMs, PreSubmitGpuMs, PostSubmitGpuMs, TotalRenderGpuMs\
, CompositorRenderGpuMs, CompositorRenderCpuMs, CompositorIdleCpuMs\
, ClientFrameIntervalMs\
, WaitGetPosesCalledMs, NewPosesReadyMs, NewFrameReadyMs\
, CompositorUpdateStartMs, CompositorUpdateEndMs, CompositorRenderStartMs";

const ROLLUP_HEADER: &str = "epochSeconds, localDateTime, minFPS, maxFPS, avgFPS";
const SUMMARY_HEADER: &str = "Avg FPS, Min FPS, Max FPS";

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything the logger reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// A single frame with its instantaneous FPS.
    Frame(FrameFps),
    /// Aggregate over the frames surfaced by one poll.
    Summary(PollSummary),
    Rollup(Rollup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Frames,
    Rollups,
}

pub trait Sink {
    fn write_row(&mut self, row: &Row) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Delimited text output of either per-frame rows or rollup rows.
pub struct CsvSink<W: Write> {
    writer: W,
    kind: RowKind,
}

impl<W: Write> CsvSink<W> {
    /// Wraps `writer` and writes the header line for `kind`.
    #[cfg(test)]
    pub fn new(writer: W, kind: RowKind) -> io::Result<Self> {
        let mut sink = Self::headless(writer, kind);
        sink.write_header()?;
        Ok(sink)
    }

    fn headless(writer: W, kind: RowKind) -> Self {
        Self { writer, kind }
    }

    fn write_header(&mut self) -> io::Result<()> {
        let header = match self.kind {
            RowKind::Frames => FRAME_HEADER,
            RowKind::Rollups => ROLLUP_HEADER,
        };
        writeln!(self.writer, "{header}")
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl CsvSink<BufWriter<File>> {
    /// Opens `path` for appending; the header is only written to empty files.
    pub fn append_to(path: &Path, kind: RowKind) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut sink = Self::headless(BufWriter::new(file), kind);
        if is_empty {
            sink.write_header()?;
        }
        Ok(sink)
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn write_row(&mut self, row: &Row) -> io::Result<()> {
        match (self.kind, row) {
            (RowKind::Frames, Row::Frame(frame)) => write_frame(&mut self.writer, frame),
            (RowKind::Rollups, Row::Rollup(rollup)) => write_rollup(&mut self.writer, rollup),
            _ => Ok(()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Human readable progress output: poll summaries and rollups.
pub struct ConsoleSink<W: Write> {
    writer: W,
    summary_header: bool,
    rollup_header: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            summary_header: false,
            rollup_header: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Sink for ConsoleSink<W> {
    fn write_row(&mut self, row: &Row) -> io::Result<()> {
        match row {
            Row::Frame(_) => Ok(()),
            Row::Summary(summary) => {
                if !self.summary_header {
                    writeln!(self.writer, "{SUMMARY_HEADER}")?;
                    self.summary_header = true;
                }
                writeln!(
                    self.writer,
                    "{:.2}, {}, {}",
                    summary.avg, summary.min, summary.max
                )
            }
            Row::Rollup(rollup) => {
                if !self.rollup_header {
                    writeln!(self.writer, "{ROLLUP_HEADER}")?;
                    self.rollup_header = true;
                }
                write_rollup(&mut self.writer, rollup)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Fan-out over all configured sinks.
///
/// Write failures are logged and otherwise ignored; a broken sink never stops the logger.
#[derive(Default)]
pub struct Sinks {
    sinks: Vec<Box<dyn Sink + Send>>,
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Sink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Writes `row` to every sink; returns the number of sinks that failed.
    pub fn write(&mut self, row: &Row) -> usize {
        let mut failed = 0;
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(e) = sink.write_row(row) {
                warn!(sink = index, "failed to write row: {e}");
                failed += 1;
            }
        }
        failed
    }

    pub fn flush(&mut self) {
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(e) = sink.flush() {
                warn!(sink = index, "failed to flush: {e}");
            }
        }
    }
}

fn write_frame<W: Write>(writer: &mut W, frame: &FrameFps) -> io::Result<()> {
    let t = &frame.timing;
    writeln!(
        writer,
        "{}, {}, {}, {}, {}, {}, {}, {}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}",
        frame.fps,
        t.frame_index,
        t.num_frame_presents,
        t.num_mis_presented,
        t.num_dropped_frames,
        u8::from(t.reprojection_motion()),
        t.predicted_frames(),
        t.throttled_frames(),
        t.system_time_ms(),
        t.pre_submit_gpu_ms,
        t.post_submit_gpu_ms,
        t.total_render_gpu_ms,
        t.compositor_render_gpu_ms,
        t.compositor_render_cpu_ms,
        t.compositor_idle_cpu_ms,
        t.client_frame_interval_ms,
        t.wait_get_poses_called_ms,
        t.new_poses_ready_ms,
        t.new_frame_ready_ms,
        t.compositor_update_start_ms,
        t.compositor_update_end_ms,
        t.compositor_render_start_ms,
    )
}

fn write_rollup<W: Write>(writer: &mut W, rollup: &Rollup) -> io::Result<()> {
    writeln!(
        writer,
        "{}, {}, {}, {}, {:.2}",
        rollup.epoch_seconds(),
        rollup.at.format(LOCAL_TIME_FORMAT),
        rollup.min,
        rollup.max,
        rollup.avg
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::FrameTiming;
    use chrono::{Local, TimeZone};

    fn frame_row() -> Row {
        let timing = FrameTiming {
            num_frame_presents: 1,
            reprojection_flags: 0x08 | (1 << 4),
            pre_submit_gpu_ms: 1.234,
            total_render_gpu_ms: 7.5,
            client_frame_interval_ms: 11.111,
            ..FrameTiming::new(42, 12.3456)
        };
        Row::Frame(FrameFps { fps: 90, timing })
    }

    fn rollup_row() -> Row {
        let at = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous local time");
        Row::Rollup(Rollup {
            at,
            min: 80,
            max: 91,
            avg: 88.456,
        })
    }

    fn output(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).expect("utf-8 output")
    }

    #[test]
    fn frame_csv_has_header_and_fixed_decimals() {
        let mut sink = CsvSink::new(Vec::new(), RowKind::Frames).expect("header");
        sink.write_row(&frame_row()).expect("row");
        sink.write_row(&rollup_row()).expect("ignored row");

        let text = output(sink.into_inner());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], FRAME_HEADER);
        assert_eq!(lines[0].split(", ").count(), 22);
        assert_eq!(
            lines[1],
            "90, 42, 1, 0, 0, 1, 1, 0, 12345.60, 1.23, 0.00, 7.50, 0.00, 0.00, 0.00, 11.11, 0.00, 0.00, 0.00, 0.00, 0.00, 0.00"
        );
    }

    #[test]
    fn rollup_csv_row_layout() {
        let mut sink = CsvSink::new(Vec::new(), RowKind::Rollups).expect("header");
        sink.write_row(&frame_row()).expect("ignored row");
        sink.write_row(&rollup_row()).expect("row");

        let text = output(sink.into_inner());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], ROLLUP_HEADER);
        assert!(lines[1].ends_with(", 2024-03-09 14:05:07, 80, 91, 88.46"));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn append_writes_header_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("frames.csv");

        for _ in 0..2 {
            let mut sink = CsvSink::append_to(&path, RowKind::Frames).expect("open");
            sink.write_row(&frame_row()).expect("row");
            sink.flush().expect("flush");
        }

        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text.matches("FrameIndex").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn console_prints_summaries_with_header() {
        let mut sink = ConsoleSink::new(Vec::new());
        let summary = Row::Summary(PollSummary {
            frames: 45,
            min: 88,
            max: 90,
            avg: 89.5,
        });
        sink.write_row(&frame_row()).expect("ignored");
        sink.write_row(&summary).expect("summary");
        sink.write_row(&summary).expect("summary");

        let text = output(sink.into_inner());
        assert_eq!(text, "Avg FPS, Min FPS, Max FPS\n89.50, 88, 90\n89.50, 88, 90\n");
    }

    struct Broken;

    impl Sink for Broken {
        fn write_row(&mut self, _row: &Row) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("frames.csv");
        let file = CsvSink::append_to(&path, RowKind::Frames).expect("open");

        let mut sinks = Sinks::new().with(Broken).with(file);
        assert_eq!(sinks.write(&frame_row()), 1);
        sinks.flush();
        drop(sinks);

        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text.lines().count(), 2);
    }
}
