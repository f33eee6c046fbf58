//! Presenters: where composited frames go.

mod headless;

use anyhow::Result;

use crate::frame::Frame;

pub use headless::HeadlessPresenter;

pub trait Presenter {
    /// Show one composited frame.
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// True once the user (or a limit) asks the pipeline to stop.
    fn poll_cancel(&mut self) -> bool;
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        (**self).show(frame)
    }

    fn poll_cancel(&mut self) -> bool {
        (**self).poll_cancel()
    }
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        (**self).show(frame)
    }

    fn poll_cancel(&mut self) -> bool {
        (**self).poll_cancel()
    }
}
