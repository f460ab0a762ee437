//! Optional application error logger.
//!
//! Failed requests are always reported through `tracing`. An [`ErrorLog`]
//! additionally hands each failure to whatever the application uses for
//! error tracking.

use crate::error::RenderError;

pub trait ErrorLog: Send + Sync + 'static {
    fn error(&self, error: &RenderError);
}

impl<F> ErrorLog for F
where
    F: Fn(&RenderError) + Send + Sync + 'static,
{
    fn error(&self, error: &RenderError) {
        self(error)
    }
}
