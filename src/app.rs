use std::fmt;

use crate::broker::BrokerEvent;
use crate::error::Result;
use crate::window::SampleWindow;

/// Receives one broker delivery at a time.
pub trait MessageHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// Draws the current window. Called synchronously after every change.
pub trait Renderer {
    fn render(&mut self, window: &SampleWindow, link: &LinkState) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Failed(String),
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Failed(reason) => write!(f, "failed: {reason}"),
            LinkState::Closed => write!(f, "closed"),
        }
    }
}

// Main application state
pub struct App<R: Renderer> {
    window: SampleWindow,
    link: LinkState,
    renderer: R,
}

impl<R: Renderer> App<R> {
    pub fn new(window: SampleWindow, renderer: R) -> Self {
        Self {
            window,
            link: LinkState::Connecting,
            renderer,
        }
    }

    pub fn handle(&mut self, event: BrokerEvent) -> Result<()> {
        match event {
            BrokerEvent::Message { topic, payload } => self.on_message(&topic, &payload),
            BrokerEvent::Connected => {
                self.link = LinkState::Connected;
                self.redraw()
            }
            BrokerEvent::Failed(reason) => {
                self.link = LinkState::Failed(reason);
                self.redraw()
            }
            BrokerEvent::Closed => {
                // keep the failure reason on screen
                if !matches!(self.link, LinkState::Failed(_)) {
                    self.link = LinkState::Closed;
                }
                self.redraw()
            }
        }
    }

    pub fn redraw(&mut self) -> Result<()> {
        self.renderer.render(&self.window, &self.link)
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl<R: Renderer> MessageHandler for App<R> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        match self.window.record(topic, payload) {
            Some(_) => self.redraw(),
            None => Ok(()),
        }
    }
}
