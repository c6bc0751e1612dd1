pub mod shell;

pub use shell::{Prompter, Shell, ShellError};
