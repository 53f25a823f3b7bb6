//! Traits for abstraction of the package tools (dir2mp, mpinfo).

use log::error;
use std::error::Error;

/// Trait that represents a functionality of a command line tool.
///
/// Every tool is executed with a set of parameters, usually a struct parsed
/// by `structopt`. Tools do their side-effects (writing a package, dumping
/// files) and return an output describing what was done.
pub trait Tool {
    /// Parameters accepted by this tool.
    type Params;

    /// Output of a successful run.
    type Output;

    /// Error of a failed run.
    type Error: Error;

    /// Performs the effect of this tool with specified parameters.
    fn execute(&self, params: Self::Params) -> Result<Self::Output, Self::Error>;
}

/// Runs `tool` and logs the complete error chain when it fails. Returns the
/// process exit code to use.
pub fn run<T, F>(tool: &T, params: T::Params, on_success: F) -> i32
where
    T: Tool,
    F: FnOnce(T::Output),
{
    match tool.execute(params) {
        Ok(output) => {
            on_success(output);
            0
        }
        Err(e) => {
            error!("{}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {}", cause);
                source = cause.source();
            }
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tool::{run, Tool};
    use std::fmt;

    #[derive(Debug)]
    struct Odd(u32);

    impl fmt::Display for Odd {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} is odd", self.0)
        }
    }

    impl std::error::Error for Odd {}

    struct Half;

    impl Tool for Half {
        type Params = u32;
        type Output = u32;
        type Error = Odd;

        fn execute(&self, params: u32) -> Result<u32, Odd> {
            if params % 2 == 0 {
                Ok(params / 2)
            } else {
                Err(Odd(params))
            }
        }
    }

    #[test]
    fn run_reports_exit_codes() {
        let mut seen = None;
        assert_eq!(run(&Half, 8, |o| seen = Some(o)), 0);
        assert_eq!(seen, Some(4));

        assert_eq!(run(&Half, 3, |_| panic!("must not be called")), 1);
    }
}
