use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::commands::{Command, HELP};
use crate::output::{OutputSink, PngFileSink, CUTOUT_FILE_NAME};
use crate::session::{Outcome, Phase, SessionController, SessionError};
use crate::source::{self, FileSource, Gallery};
use crate::worker::GatewayError;

/// Whether the command loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Command loop around a [`SessionController`]
pub struct App {
    controller: SessionController,
    gallery: Gallery,
    output_dir: PathBuf,
    wait_each: bool,
}

impl App {
    pub fn new(controller: SessionController, gallery: Gallery, output_dir: PathBuf) -> Self {
        Self {
            controller,
            gallery,
            output_dir,
            wait_each: true,
        }
    }

    /// Return after each command instead of waiting for its request
    pub fn without_waiting(mut self) -> Self {
        self.wait_each = false;
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Run commands from `input` until it ends or `quit`
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        for (number, line) in input.lines().enumerate() {
            let line = line.context("Failed to read command")?;
            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!("line {}: {}", number + 1, err);
                    continue;
                }
            };

            tracing::debug!("Executing {:?}", command);
            let result = self.execute(command).and_then(|flow| {
                self.settle()?;
                Ok(flow)
            });
            match result {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => report(err)?,
            }
        }

        // Let the last request land before the worker is shut down
        self.controller.wait().or_else(report)?;
        Ok(())
    }

    fn settle(&mut self) -> Result<(), SessionError> {
        if self.wait_each {
            self.controller.wait()
        } else {
            self.controller.pump()
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Flow, SessionError> {
        match command {
            Command::Open(path) => {
                let outcome = self.controller.load_image(&FileSource::new(path), true)?;
                log_outcome("open", outcome);
            }
            Command::Drop(location) => {
                let source = source::from_location(&location);
                let outcome = self.controller.load_image(source.as_ref(), true)?;
                log_outcome("drop", outcome);
            }
            Command::Example(index) => {
                let source = self.gallery.get(index)?;
                let outcome = self.controller.load_image(&source, false)?;
                log_outcome("example", outcome);
            }
            Command::Examples => {
                if self.gallery.is_empty() {
                    println!("no example images");
                }
                for (i, path) in self.gallery.entries().iter().enumerate() {
                    println!("{i}: {}", path.display());
                }
            }
            Command::Click { x, y, shift } => {
                let outcome = self.controller.click(x, y, shift)?;
                log_outcome("click", outcome);
            }
            Command::Mode(mode) => {
                self.controller.toggle_point_mode(mode);
            }
            Command::Undo => {
                let outcome = self.controller.undo()?;
                log_outcome("undo", outcome);
            }
            Command::Clear => {
                let outcome = self.controller.clear();
                log_outcome("clear", outcome);
            }
            Command::Download(path) => {
                let path = path.unwrap_or_else(|| self.output_dir.join(CUTOUT_FILE_NAME));
                let cutout = self.controller.export()?;
                write(&mut PngFileSink::new(path), &cutout);
            }
            Command::Preview(path) => {
                let preview = self.controller.preview()?;
                write(&mut PngFileSink::new(path), &preview);
            }
            Command::Resize(width) => self.controller.resize(width),
            Command::Model(id) => self.controller.select_model(&id)?,
            Command::Wait => self.controller.wait()?,
            Command::Status => self.print_status(),
            Command::Points => {
                for (i, point) in self.controller.state().points.iter().enumerate() {
                    let label = if point.is_foreground { "fg" } else { "bg" };
                    println!("{i}: ({:.4}, {:.4}) {label}", point.x, point.y);
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn print_status(&self) {
        let state = self.controller.state();
        let viewport = self.controller.viewport();
        let phase = match self.controller.phase() {
            Phase::Empty => "no image",
            Phase::Embedding => "embedding",
            Phase::Ready => "ready",
            Phase::Segmenting => "segmenting",
        };
        println!("phase:    {phase}");
        println!("model:    {}", self.controller.model_id());
        println!("image:    {}", state.image_url.as_deref().unwrap_or("-"));
        println!("points:   {}", state.points.len());
        println!(
            "mode:     {}",
            if state.background_mode { "background" } else { "mask" }
        );
        println!("viewport: {:.0}x{:.0}", viewport.width, viewport.height);
        println!(
            "controls: clear={} undo={} download={}",
            state.controls.clear, state.controls.undo, state.controls.download
        );
        if !state.status.is_empty() {
            println!("status:   {}", state.status);
        }
    }
}

fn write(sink: &mut dyn OutputSink, image: &image::RgbaImage) {
    if let Err(err) = sink.write_image(image) {
        tracing::error!("Failed to write {}: {:#}", sink.location(), err);
    }
}

fn log_outcome(action: &str, outcome: Outcome) {
    match outcome {
        Outcome::Applied(Some(id)) => tracing::debug!("{} started request {}", action, id),
        Outcome::Applied(None) => tracing::debug!("{} applied", action),
        Outcome::Ignored(reason) => tracing::info!("{} ignored: {:?}", action, reason),
    }
}

/// Log a command error; only a lost worker ends the session
fn report(err: SessionError) -> Result<()> {
    if let SessionError::Gateway(GatewayError::Disconnected) = err {
        return Err(err).context("Inference worker stopped");
    }
    tracing::error!("{}", err);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::ModelCatalog;
    use crate::session::Point;
    use crate::testing::FakeFactory;
    use crate::worker::InferenceGateway;
    use image::RgbImage;

    fn app(output_dir: PathBuf, gallery: Gallery) -> App {
        let gateway = InferenceGateway::spawn(Box::new(FakeFactory::new())).unwrap();
        let controller = SessionController::new(gateway, ModelCatalog::new("/models"));
        App::new(controller, gallery, output_dir)
    }

    #[test]
    fn script_loads_clicks_and_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("input.png");
        RgbImage::from_pixel(100, 100, image::Rgb([50, 60, 70]))
            .save(&image_path)
            .unwrap();
        let script = format!(
            "open {}\nclick 50 50\nnot-a-command\ndownload\npreview {}\n",
            image_path.display(),
            dir.path().join("preview.png").display()
        );

        let mut app = app(dir.path().to_path_buf(), Gallery::default());
        app.run(script.as_bytes()).unwrap();

        assert_eq!(
            app.controller().state().points.as_slice(),
            &[Point::foreground(0.5, 0.5)]
        );
        let cutout = image::open(dir.path().join(CUTOUT_FILE_NAME))
            .unwrap()
            .to_rgba8();
        assert_eq!(cutout.dimensions(), (100, 100));
        assert_eq!(cutout.get_pixel(10, 10).0, [50, 60, 70, 255]);
        assert_eq!(cutout.get_pixel(90, 10)[3], 0);
        assert!(dir.path().join("preview.png").exists());
    }

    #[test]
    fn command_errors_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().to_path_buf(), Gallery::default());

        app.run("open /missing.png\ndownload\nexample 4\nmode bg\n".as_bytes())
            .unwrap();

        assert!(app.controller().state().background_mode);
        assert_eq!(app.controller().phase(), Phase::Empty);
    }

    #[test]
    fn quit_stops_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().to_path_buf(), Gallery::default());

        app.run("mode bg\nquit\nmode fg\n".as_bytes()).unwrap();

        assert!(app.controller().state().background_mode);
    }

    #[test]
    fn example_keeps_point_mode() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(8, 8).save(dir.path().join("a.png")).unwrap();
        let gallery = Gallery::scan(dir.path()).unwrap();
        let mut app = app(dir.path().to_path_buf(), gallery);

        app.run("mode bg\nexample 0\n".as_bytes()).unwrap();

        let state = app.controller().state();
        assert!(state.background_mode);
        assert!(state.has_image);
        assert_eq!(app.controller().phase(), Phase::Ready);
    }
}
