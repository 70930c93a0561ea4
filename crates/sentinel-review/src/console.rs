//! Serialized access to the local terminal.
//!
//! Human supervisors announce pending reviews on the console. Several
//! reviews can be outstanding at once, so each announcement is written as
//! one block under a shared async lock and never interleaves with another.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

type Sink = Box<dyn Write + Send>;

#[derive(Clone)]
pub struct ReviewConsole {
    sink: Arc<Mutex<Sink>>,
}

impl ReviewConsole {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write `lines` as one uninterrupted block.
    pub async fn announce(&self, lines: &[String]) {
        let mut sink = self.sink.lock().await;
        for line in lines {
            if let Err(e) = writeln!(sink, "{}", line) {
                warn!(error = %e, "review console write failed");
                return;
            }
        }
        if let Err(e) = sink.flush() {
            warn!(error = %e, "review console flush failed");
        }
    }
}
