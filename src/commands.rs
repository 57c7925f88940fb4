use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("invalid {argument} `{value}`")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
    #[error("`{0}` takes no further arguments")]
    TrailingArguments(&'static str),
}

/// One line of session input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Pick an image file
    Open(String),
    /// Drop a file path or URI onto the canvas
    Drop(String),
    /// Load an image from the example gallery
    Example(usize),
    /// List the example gallery
    Examples,
    /// Click the canvas at widget coordinates, optionally with the modifier
    Click { x: f32, y: f32, shift: bool },
    /// Toggle the point mode, or set it (`Some(true)` = background)
    Mode(Option<bool>),
    Undo,
    Clear,
    /// Export the cutout, to the given path or the default file
    Download(Option<PathBuf>),
    /// Write the base canvas with the overlay on top
    Preview(PathBuf),
    /// Change the canvas widget width
    Resize(f32),
    /// Select the model for later requests
    Model(String),
    /// Block until the outstanding request finishes
    Wait,
    Status,
    Points,
    Help,
    Quit,
}

pub const HELP: &str = "\
open <path>            load an image file
drop <path|uri>        load a dropped file or URI
examples               list example images
example <n>            load example image n
click <x> <y> [shift]  add or remove a point at widget coordinates
mode [fg|bg]           toggle or set the point mode
undo                   remove the last point
clear                  reset the session
download [path]        write the cutout PNG
preview <path>         write the canvas with the mask overlay
resize <width>         set the canvas widget width
model <id>             choose the segmentation model
wait                   wait for the running request
status                 show session state
points                 list points
quit                   exit";

impl Command {
    /// Parse a line; blank lines and `#` comments give `None`
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = strip_comment(line).trim();
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "open" => Self::Open(rest("open", "a path", &args)?),
            "drop" => Self::Drop(rest("drop", "a path or URI", &args)?),
            "example" => {
                no_more("example", &args, 1)?;
                Self::Example(number(required("example", "an index", &args, 0)?, "index")?)
            }
            "examples" => bare("examples", &args, Self::Examples)?,
            "click" => {
                no_more("click", &args, 3)?;
                let x = number(required("click", "x and y", &args, 0)?, "x")?;
                let y = number(required("click", "x and y", &args, 1)?, "y")?;
                let shift = match args.get(2) {
                    None => false,
                    Some(flag) if flag.eq_ignore_ascii_case("shift") => true,
                    Some(flag) => {
                        return Err(ParseError::InvalidArgument {
                            argument: "modifier",
                            value: flag.to_string(),
                        })
                    }
                };
                Self::Click { x, y, shift }
            }
            "mode" => {
                no_more("mode", &args, 1)?;
                let mode = match args.first().map(|a| a.to_ascii_lowercase()) {
                    None => None,
                    Some(m) if m == "fg" || m == "mask" => Some(false),
                    Some(m) if m == "bg" || m == "background" => Some(true),
                    Some(m) => {
                        return Err(ParseError::InvalidArgument {
                            argument: "mode",
                            value: m,
                        })
                    }
                };
                Self::Mode(mode)
            }
            "undo" => bare("undo", &args, Self::Undo)?,
            "clear" => bare("clear", &args, Self::Clear)?,
            "download" => {
                if args.is_empty() {
                    Self::Download(None)
                } else {
                    Self::Download(Some(PathBuf::from(args.join(" "))))
                }
            }
            "preview" => Self::Preview(PathBuf::from(rest("preview", "a path", &args)?)),
            "resize" => {
                no_more("resize", &args, 1)?;
                Self::Resize(parse_width(required("resize", "a width", &args, 0)?)?)
            }
            "model" => {
                no_more("model", &args, 1)?;
                Self::Model(required("model", "a model id", &args, 0)?.to_string())
            }
            "wait" => bare("wait", &args, Self::Wait)?,
            "status" => bare("status", &args, Self::Status)?,
            "points" => bare("points", &args, Self::Points)?,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Parse a canvas widget width: finite and positive
pub fn parse_width(value: &str) -> Result<f32, ParseError> {
    let width: f32 = number(value, "width")?;
    if !width.is_finite() || width <= 0.0 {
        return Err(ParseError::InvalidArgument {
            argument: "width",
            value: value.to_string(),
        });
    }
    Ok(width)
}

/// Cut a `#` comment; the `#` must start the line or follow whitespace
fn strip_comment(line: &str) -> &str {
    let mut after_space = true;
    for (i, c) in line.char_indices() {
        if c == '#' && after_space {
            return &line[..i];
        }
        after_space = c.is_whitespace();
    }
    line
}

fn required<'a>(
    command: &'static str,
    argument: &'static str,
    args: &[&'a str],
    index: usize,
) -> Result<&'a str, ParseError> {
    args.get(index)
        .copied()
        .ok_or(ParseError::MissingArgument { command, argument })
}

fn rest(command: &'static str, argument: &'static str, args: &[&str]) -> Result<String, ParseError> {
    if args.is_empty() {
        return Err(ParseError::MissingArgument { command, argument });
    }
    Ok(args.join(" "))
}

fn no_more(command: &'static str, args: &[&str], max: usize) -> Result<(), ParseError> {
    if args.len() > max {
        return Err(ParseError::TrailingArguments(command));
    }
    Ok(())
}

fn bare(command: &'static str, args: &[&str], value: Command) -> Result<Command, ParseError> {
    no_more(command, args, 0)?;
    Ok(value)
}

fn number<T: FromStr>(value: &str, argument: &'static str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidArgument {
        argument,
        value: value.to_string(),
    })
}
