use crate::{Acquisition, Chunk, ChunkWriter, Counter};
use anyhow::Result;
use crossbeam_channel::{tick, Receiver, RecvTimeoutError, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::{info, warn};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Stylize,
    symbols::border,
    text::{Line, Text},
    widgets::{Block, Paragraph, Widget},
    DefaultTerminal, Frame,
};
use std::time::{Duration, Instant};

/// Why the status loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusExit {
    Quit,
    Timeout,
    /// The acquisition worker stopped on its own (error or loop count reached).
    Finished,
}

#[derive(Debug)]
pub struct Status {
    pub counter: Counter,
    pub t_begin: Instant,
    /// `Duration::ZERO` runs until stopped.
    pub run_duration: Duration,
    pub run_num: usize,
    pub camp_num: usize,
    pub queue_len: usize,
    pub card: String,
    pub exit: Option<StatusExit>,
}

impl Status {
    pub fn new(card: String, camp_num: usize, run_num: usize, run_duration: Duration) -> Self {
        Self {
            counter: Counter::default(),
            t_begin: Instant::now(),
            run_duration,
            run_num,
            camp_num,
            queue_len: 0,
            card,
            exit: None,
        }
    }

    /// Drives the status screen until `q`, the run duration, or the end of the
    /// acquisition.
    pub fn run(
        &mut self,
        terminal: &mut DefaultTerminal,
        rx_stats: &Receiver<(usize, usize)>,
        acquisition: &Acquisition,
    ) -> Result<StatusExit> {
        let ticker = tick(Duration::from_millis(250));
        self.start();
        loop {
            let _ = ticker.recv();
            self.absorb(rx_stats);
            self.handle_events()?;
            self.check(acquisition.is_finished());
            terminal.draw(|f| self.draw(f))?;
            if let Some(exit) = self.exit {
                return Ok(exit);
            }
        }
    }

    /// Same loop without a terminal; progress goes to the log once a second.
    pub fn run_headless(
        &mut self,
        rx_stats: &Receiver<(usize, usize)>,
        acquisition: &Acquisition,
    ) -> StatusExit {
        let ticker = tick(Duration::from_secs(1));
        self.start();
        loop {
            let _ = ticker.recv();
            self.absorb(rx_stats);
            self.check(acquisition.is_finished());
            info!(
                "Time (s): {} Chunks: {} Rate (MB/s): {:.2} Queue: {}",
                self.t_begin.elapsed().as_secs(),
                self.counter.chunks,
                self.counter.rate(),
                self.queue_len
            );
            if let Some(exit) = self.exit {
                return exit;
            }
        }
    }

    fn start(&mut self) {
        self.t_begin = Instant::now();
        self.exit = None;
        self.counter.reset();
        self.queue_len = 0;
    }

    fn absorb(&mut self, rx_stats: &Receiver<(usize, usize)>) {
        while let Ok((size, queued)) = rx_stats.try_recv() {
            self.counter.increment(size);
            self.queue_len = queued;
        }
    }

    fn check(&mut self, worker_finished: bool) {
        if self.exit.is_some() {
            return;
        }
        if worker_finished {
            self.exit = Some(StatusExit::Finished);
        } else if !self.run_duration.is_zero() && self.t_begin.elapsed() >= self.run_duration {
            self.exit = Some(StatusExit::Timeout);
        }
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::ZERO)? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    self.handle_key_event(key_event);
                }
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        if let KeyCode::Char('q') = key_event.code {
            self.exit = Some(StatusExit::Quit);
        }
    }
}

impl Widget for &Status {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title =
            Line::from(format!(" Campaign {} Run {} Status ", self.camp_num, self.run_num).bold());
        let instructions = Line::from(vec![" Quit ".into(), "<Q> ".blue().bold()]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let status_text = Text::from(vec![
            Line::from(self.card.as_str().green()),
            Line::from(vec![
                "Elapsed time: ".into(),
                self.t_begin.elapsed().as_secs().to_string().yellow(),
                " s".into(),
                " Chunks: ".into(),
                self.counter.chunks.to_string().yellow(),
                " Data rate: ".into(),
                format!("{:.2}", self.counter.rate()).yellow(),
                " MB/s ".into(),
                " Queue length: ".into(),
                self.queue_len.to_string().yellow(),
            ]),
        ]);

        Paragraph::new(status_text)
            .centered()
            .block(block)
            .render(area, buf);
    }
}

/// Consumes chunks until the acquisition worker drops its sender: records each
/// one and reports `(bytes, queue length)` to the status loop.
///
/// Returns the number of chunks consumed.
pub fn chunk_processing(
    rx: Receiver<Chunk>,
    tx_stats: Sender<(usize, usize)>,
    mut writer: Option<Box<dyn ChunkWriter>>,
) -> Result<u64> {
    let mut consumed = 0;
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(chunk) => {
                consumed += 1;
                // the status loop may already be gone during shutdown
                let _ = tx_stats.send((chunk.len(), rx.len()));
                if let Some(w) = writer.as_mut() {
                    if let Err(e) = w.append(&chunk) {
                        warn!("Recording stopped: {e:#}");
                        writer = None;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if let Some(w) = writer.as_mut() {
        w.finish()?;
    }
    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawWriter, RunInfo};
    use crossbeam_channel::unbounded;

    #[test]
    fn status_widget_shows_run_and_card() {
        let mut status = Status::new("M4i.4480-x8 sn 12345".into(), 2, 7, Duration::ZERO);
        status.counter.increment(1024);
        let area = Rect::new(0, 0, 100, 5);
        let mut buf = Buffer::empty(area);
        (&status).render(area, &mut buf);
        let text: String = buf.content.iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Campaign 2 Run 7 Status"));
        assert!(text.contains("M4i.4480-x8"));
        assert!(text.contains("Chunks: 1"));
    }

    #[test]
    fn exit_reasons() {
        let mut status = Status::new(String::new(), 0, 0, Duration::ZERO);
        status.check(false);
        assert_eq!(status.exit, None);
        status.check(true);
        assert_eq!(status.exit, Some(StatusExit::Finished));

        let mut status = Status::new(String::new(), 0, 0, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        status.check(false);
        assert_eq!(status.exit, Some(StatusExit::Timeout));

        let mut status = Status::new(String::new(), 0, 0, Duration::ZERO);
        status.handle_key_event(KeyEvent::from(KeyCode::Char('q')));
        status.check(true);
        assert_eq!(status.exit, Some(StatusExit::Quit));
    }

    #[test]
    fn processing_records_until_sender_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run0_0.bin");
        let run = RunInfo {
            device: "sim0".into(),
            model: "M4i.4480-x8".into(),
            serial_number: 1,
            sample_rate: 1_000,
            channel_mask: 1,
            channel_count: 1,
            bytes_per_sample: 2,
        };
        let writer: Box<dyn ChunkWriter> = Box::new(RawWriter::create(&path, &run).unwrap());
        let (tx, rx) = unbounded();
        let (tx_stats, rx_stats) = unbounded();
        for seq in 0..4u8 {
            tx.send(Chunk::copy_from(seq as u64, 0, &[seq; 3])).unwrap();
        }
        drop(tx);
        let consumed = chunk_processing(rx, tx_stats, Some(writer)).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(rx_stats.try_iter().map(|(n, _)| n).sum::<usize>(), 12);
        assert_eq!(
            std::fs::read(&path).unwrap(),
            vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3]
        );
    }
}
