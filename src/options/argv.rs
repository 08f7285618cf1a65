//! The reference tool's argv grammar: long options with optional `=value`,
//! `--no-` negations, bundled short options whose values swallow the rest
//! of the bundle, `--` termination, and at most two trailing positionals.

use super::table::LOOKUP;
use super::{Options, SetArg};
use crate::OptionError;

pub(crate) fn apply_argv<I, S>(o: &mut Options, argv: I) -> Result<(), OptionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = argv.into_iter().map(|s| s.as_ref().to_owned()).collect();
    let mut positionals: Vec<String> = Vec::new();
    let mut no_more_options = false;
    let mut i = 0;

    while i < args.len() {
        let tok = args[i].as_str();
        i += 1;

        if no_more_options {
            positionals.push(tok.to_owned());
            continue;
        }
        if tok == "--" {
            no_more_options = true;
            continue;
        }

        if let Some(body) = tok.strip_prefix("--") {
            if let Some(first) = positionals.first() {
                return Err(OptionError::StrayArgument(first.clone()));
            }
            parse_long(o, body, &args, &mut i)?;
        } else if tok.len() > 1 && tok.starts_with('-') {
            if let Some(first) = positionals.first() {
                return Err(OptionError::StrayArgument(first.clone()));
            }
            parse_bundle(o, &tok[1..], &args, &mut i)?;
        } else {
            positionals.push(tok.to_owned());
        }
    }

    let mut rest = positionals.into_iter();
    o.source = rest.next();
    o.dest = rest.next();
    if let Some(extra) = rest.next() {
        return Err(OptionError::TooManyArguments(extra));
    }
    Ok(())
}

fn parse_long(
    o: &mut Options,
    body: &str,
    args: &[String],
    i: &mut usize,
) -> Result<(), OptionError> {
    let (name, inline) = match body.split_once('=') {
        Some((n, v)) => (n, Some(v)),
        None => (body, None),
    };

    if let Some(idx) = LOOKUP.find(name) {
        if LOOKUP.info[idx].value_type.is_some() {
            let value = match inline {
                Some(v) => v.to_owned(),
                // a following argv element only counts as the value when
                // it does not look like another option
                None if *i < args.len() && !args[*i].starts_with('-') => {
                    let v = args[*i].clone();
                    *i += 1;
                    v
                }
                None => return Err(OptionError::MissingValue(format!("--{name}"))),
            };
            return o.apply_entry(idx, SetArg::Value(&value), name);
        }
        if inline.is_some() {
            return Err(OptionError::UnexpectedValue(format!("--{name}")));
        }
        return o.apply_entry(idx, SetArg::Switch, name);
    }

    // --no-foo
    if let Some(base) = name.strip_prefix("no-").or_else(|| name.strip_prefix("no_"))
        && let Some(idx) = LOOKUP.find(base)
        && LOOKUP.info[idx].negatable
    {
        if inline.is_some() {
            return Err(OptionError::UnexpectedValue(format!("--no-{base}")));
        }
        return o.apply_entry(idx, SetArg::Negate, base);
    }

    Err(OptionError::UnknownOption(format!("--{name}")))
}

fn parse_bundle(
    o: &mut Options,
    bundle: &str,
    args: &[String],
    i: &mut usize,
) -> Result<(), OptionError> {
    let mut chars = bundle.char_indices();
    while let Some((pos, ch)) = chars.next() {
        let name = ch.to_string();
        let Some(idx) = LOOKUP.find(&name) else {
            return Err(OptionError::UnknownOption(format!("-{ch}")));
        };
        if LOOKUP.info[idx].value_type.is_some() {
            let rest = &bundle[pos + ch.len_utf8()..];
            let value = if rest.is_empty() {
                if *i < args.len() {
                    let v = args[*i].clone();
                    *i += 1;
                    v
                } else {
                    return Err(OptionError::MissingValue(format!("-{ch}")));
                }
            } else {
                rest.to_owned()
            };
            return o.apply_entry(idx, SetArg::Value(&value), &name);
        }
        o.apply_entry(idx, SetArg::Switch, &name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_classic_bundle() {
        let mut o = Options::new();
        o.apply_argv(["-avxH", "--delete"]).unwrap();
        assert_eq!(o.recursive, Some(1));
        assert_eq!(o.owner, 1);
        assert_eq!(o.group, 1);
        assert_eq!(o.perms, 1);
        assert_eq!(o.times, 1);
        assert_eq!(o.devices, 1);
        assert_eq!(o.specials, 1);
        assert_eq!(o.links, 1);
        assert_eq!(o.verbose, 1);
        assert_eq!(o.one_file_system, 1);
        assert_eq!(o.hard_links, 1);
        assert_eq!(o.delete, 1);
        // untouched defaults ride along
        assert_eq!(o.motd, 1);
        assert_eq!(o.implied_dirs, 1);
        assert_eq!(o.human_readable, 1);
        assert_eq!(o.inc_recursive, 1);
    }

    #[test]
    fn bundled_values_swallow_the_remainder() {
        let mut o = Options::new();
        o.apply_argv(["-B700"]).unwrap();
        assert_eq!(o.block_size, Some(700));

        let mut o = Options::new();
        o.apply_argv(["-e.iLsfx", "src/", "dst"]).unwrap();
        assert_eq!(o.rsh.as_deref(), Some(".iLsfx"));
        assert_eq!(o.source.as_deref(), Some("src/"));
        assert_eq!(o.dest.as_deref(), Some("dst"));

        // exhausted bundle takes the next element instead
        let mut o = Options::new();
        o.apply_argv(["-T", "/tmp/spool"]).unwrap();
        assert_eq!(o.temp_dir.as_deref(), Some("/tmp/spool"));

        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["-T"]),
            Err(OptionError::MissingValue(_))
        ));
    }

    #[test]
    fn long_values_inline_or_following() {
        let mut o = Options::new();
        o.apply_argv(["--max-size=1.5mb", "--min-size", "2K"]).unwrap();
        assert_eq!(o.max_size, Some(1_500_000));
        assert_eq!(o.min_size, Some(2048));

        // the next element must not look like an option
        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["--max-size", "-v"]),
            Err(OptionError::MissingValue(_))
        ));

        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["--delete=yes"]),
            Err(OptionError::UnexpectedValue(_))
        ));
    }

    #[test]
    fn negations_and_unknowns() {
        let mut o = Options::new();
        o.apply_argv(["--no-motd", "--no-whole-file"]).unwrap();
        assert_eq!(o.motd, 0);
        assert_eq!(o.whole_file, 0);

        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["--no-delete"]),
            Err(OptionError::UnknownOption(_))
        ));
        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["--frobnicate"]),
            Err(OptionError::UnknownOption(_))
        ));
        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["-Z"]),
            Err(OptionError::UnknownOption(_))
        ));
    }

    #[test]
    fn positionals_come_last() {
        let mut o = Options::new();
        o.apply_argv(["-v", "a", "b"]).unwrap();
        assert_eq!(o.source.as_deref(), Some("a"));
        assert_eq!(o.dest.as_deref(), Some("b"));

        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["a", "-v"]),
            Err(OptionError::StrayArgument(_))
        ));

        let mut o = Options::new();
        assert!(matches!(
            o.apply_argv(["-v", "a", "b", "c"]),
            Err(OptionError::TooManyArguments(_))
        ));
    }

    #[test]
    fn double_dash_ends_option_parsing() {
        let mut o = Options::new();
        o.apply_argv(["-v", "--", "--delete", "dst"]).unwrap();
        assert_eq!(o.delete, 0);
        assert_eq!(o.source.as_deref(), Some("--delete"));
        assert_eq!(o.dest.as_deref(), Some("dst"));
    }

    #[test]
    fn server_command_line_shape() {
        // what a protocol-30 client actually transmits
        let mut o = Options::new();
        o.apply_argv(["--server", "--sender", "-vlogDtpre.iLsfxC", ".", "mod/dir"])
            .unwrap();
        assert_eq!(o.server, 1);
        assert_eq!(o.sender, 1);
        assert_eq!(o.links, 1);
        assert_eq!(o.times, 1);
        assert_eq!(o.rsh.as_deref(), Some(".iLsfxC"));
        assert_eq!(o.source.as_deref(), Some("."));
        assert_eq!(o.dest.as_deref(), Some("mod/dir"));
    }
}
