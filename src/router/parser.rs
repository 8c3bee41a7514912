use crate::shared::ids::CommandName;

pub const CONFIRM_KEYWORD: &str = "confirm";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// Nothing to run; answered with help.
    Empty,
    Malformed {
        token: String,
        reason: String,
    },
    Command {
        name: CommandName,
        args: Vec<String>,
    },
    Confirm {
        token: String,
    },
}

pub fn parse(text: &str) -> ParsedInput {
    let cleaned = strip_mentions(text);
    let mut tokens = cleaned.split_whitespace().map(str::to_string);
    let Some(first) = tokens.next() else {
        return ParsedInput::Empty;
    };
    let args: Vec<String> = tokens.collect();

    if first.eq_ignore_ascii_case(CONFIRM_KEYWORD) {
        return match args.as_slice() {
            [token] => ParsedInput::Confirm {
                token: token.clone(),
            },
            _ => ParsedInput::Malformed {
                token: first,
                reason: "usage: confirm <token>".to_string(),
            },
        };
    }

    match CommandName::parse(&first) {
        Ok(name) => ParsedInput::Command { name, args },
        Err(reason) => ParsedInput::Malformed {
            token: first,
            reason,
        },
    }
}

/// Removes chat mention markup such as `<@U123ABC>` before tokenizing.
pub fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => {
                out.push(' ');
                rest = &rest[start + end + 1..];
            }
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Splits arguments into leading positional tokens and the opaque `--flag` tail.
pub fn split_positional(args: &[String]) -> (&[String], &[String]) {
    let boundary = args
        .iter()
        .position(|arg| arg.starts_with("--"))
        .unwrap_or(args.len());
    args.split_at(boundary)
}
