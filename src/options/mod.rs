//! The option model: a ~110-field record, a declarative table driving a
//! generic setter, the reference tool's argv grammar, and the set-time
//! implication rules. Hyphens and underscores are interchangeable in
//! every lookup.

mod argv;
mod size;
mod table;

pub use size::parse_size;

use crate::OptionError;
use table::{LOOKUP, TABLE, Target};

/// How a setter is being invoked: bare (`--foo`), negated (`--no-foo`),
/// or with a value.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SetArg<'a> {
    Switch,
    Negate,
    Value(&'a str),
}

/// The parsed option state of one transfer.
///
/// Numeric booleans are `i32` the way the reference tool holds them;
/// several go negative (`write_batch = -1` for `--only-write-batch`) or
/// count occurrences (`verbose`, server-side `append`). `recursive` is
/// tri-state so `--archive` can tell "never set" from "explicitly off".
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub help: i32,
    pub version: i32,
    pub verbose: i32,
    pub info: Option<String>,
    pub debug: Option<String>,
    pub msgs2stderr: i32,
    pub quiet: i32,
    pub motd: i32,
    pub checksum: i32,
    pub checksum_choice: Option<String>,
    pub archive: i32,
    pub recursive: Option<i32>,
    pub relative: i32,
    pub implied_dirs: i32,
    pub backup: i32,
    pub backup_dir: Option<String>,
    pub suffix: Option<String>,
    pub update: i32,
    pub inplace: i32,
    pub append: i32,
    pub append_verify: i32,
    pub dirs: i32,
    pub old_dirs: i32,
    pub links: i32,
    pub copy_links: i32,
    pub copy_unsafe_links: i32,
    pub safe_links: i32,
    pub munge_links: i32,
    pub copy_dirlinks: i32,
    pub keep_dirlinks: i32,
    pub hard_links: i32,
    pub perms: i32,
    pub executability: i32,
    pub chmod: Option<String>,
    pub acls: i32,
    pub xattrs: i32,
    pub owner: i32,
    pub group: i32,
    pub devices: i32,
    pub specials: i32,
    pub times: i32,
    pub omit_dir_times: i32,
    pub omit_link_times: i32,
    pub super_mode: i32,
    pub fake_super: i32,
    pub sparse: i32,
    pub preallocate: i32,
    pub dry_run: i32,
    pub whole_file: i32,
    pub one_file_system: i32,
    pub block_size: Option<i64>,
    pub rsh: Option<String>,
    pub rsync_path: Option<String>,
    pub existing: i32,
    pub ignore_existing: i32,
    pub remove_source_files: i32,
    pub delete: i32,
    pub delete_before: i32,
    pub delete_during: i32,
    pub delete_delay: i32,
    pub delete_after: i32,
    pub delete_excluded: i32,
    pub ignore_missing_args: i32,
    pub delete_missing_args: i32,
    pub force: i32,
    pub max_delete: Option<i64>,
    pub max_size: Option<i64>,
    pub min_size: Option<i64>,
    pub partial: i32,
    pub partial_dir: Option<String>,
    pub delay_updates: i32,
    pub prune_empty_dirs: i32,
    pub numeric_ids: i32,
    pub usermap: Option<String>,
    pub groupmap: Option<String>,
    pub timeout: Option<i64>,
    pub contimeout: Option<i64>,
    pub ignore_times: i32,
    pub size_only: i32,
    pub modify_window: Option<i64>,
    pub temp_dir: Option<String>,
    pub fuzzy: i32,
    pub compare_dest: i32,
    pub copy_dest: i32,
    pub link_dest: i32,
    pub compress: i32,
    pub compress_level: Option<i64>,
    pub skip_compress: Option<String>,
    pub cvs_exclude: i32,
    pub files_from: Option<String>,
    pub from0: i32,
    pub protect_args: i32,
    pub address: Option<String>,
    pub port: Option<i64>,
    pub sockopts: Option<String>,
    pub blocking_io: i32,
    pub stats: i32,
    pub eight_bit_output: i32,
    pub human_readable: i32,
    pub progress: i32,
    pub itemize_changes: i32,
    pub out_format: Option<String>,
    pub log_file: Option<String>,
    pub log_file_format: Option<String>,
    pub password_file: Option<String>,
    pub list_only: i32,
    pub bwlimit: Option<i64>,
    pub outbuf: Option<String>,
    pub write_batch: i32,
    pub read_batch: i32,
    pub batch_name: Option<String>,
    pub protocol: Option<i64>,
    pub iconv: Option<String>,
    pub checksum_seed: Option<i64>,
    pub ipv4: i32,
    pub ipv6: i32,
    pub server: i32,
    pub sender: i32,
    pub daemon: i32,
    pub config: Option<String>,
    pub dparam: Option<String>,
    pub detach: i32,
    pub inc_recursive: i32,
    pub ignore_errors: i32,

    /// Filter rules in argv order, signs/`merge,` prefixes normalised.
    pub filters: Vec<String>,
    /// `--link-dest`/`--copy-dest`/`--compare-dest` directories in order.
    pub basis_dirs: Vec<String>,
    /// `--remote-option` values; index 0 is a reserved empty slot for the
    /// remote argv[0], seeded on first use.
    pub remote_options: Vec<String>,
    pub source: Option<String>,
    pub dest: Option<String>,
}

impl Options {
    /// An option record with the transfer defaults applied
    /// (`motd`, `implied-dirs`, `human-readable`, `inc-recursive` on).
    #[must_use]
    pub fn new() -> Self {
        Self {
            motd: 1,
            implied_dirs: 1,
            human_readable: 1,
            inc_recursive: 1,
            ..Self::default()
        }
    }

    /// Runs one table entry's default action by option name, as if
    /// `--name[=value]` had been seen on the command line.
    ///
    /// # Errors
    /// Unknown names, missing or malformed values, and the set-time
    /// rejections (`--usermap` twice, `-M` without a leading dash).
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<(), OptionError> {
        let idx = LOOKUP
            .find(name)
            .ok_or_else(|| OptionError::UnknownOption(format!("--{name}")))?;
        let arg = value.map_or(SetArg::Switch, SetArg::Value);
        self.apply_entry(idx, arg, name)
    }

    /// The `--no-name` form.
    pub fn set_no(&mut self, name: &str) -> Result<(), OptionError> {
        let idx = LOOKUP
            .find(name)
            .filter(|&i| LOOKUP.info[i].negatable)
            .ok_or_else(|| OptionError::UnknownOption(format!("--no-{name}")))?;
        self.apply_entry(idx, SetArg::Negate, name)
    }

    /// Parses a full argv vector with the reference tool's grammar.
    ///
    /// # Errors
    /// Everything [`Self::set`] can raise, plus the argv-shape errors:
    /// stray non-options before the options end, more than two
    /// positionals, bundled short options that want a value the bundle
    /// cannot supply.
    pub fn apply_argv<I, S>(&mut self, argv: I) -> Result<(), OptionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        argv::apply_argv(self, argv)
    }

    /// Post-parse coherence pass: validates `checksum_choice` and forces
    /// `whole_file` when the transfer checksum is `none`.
    pub fn make_coherent(&mut self) -> Result<(), OptionError> {
        match self.checksum_choice.as_deref() {
            None | Some("auto" | "md4" | "md5" | "none") => {}
            Some(other) => {
                return Err(OptionError::InvalidChecksumChoice(other.to_owned()));
            }
        }
        if self.checksum_choice.as_deref() == Some("none") {
            self.whole_file = 1;
        }
        Ok(())
    }

    /// Effective recursion flag (tri-state collapsed).
    #[must_use]
    pub fn recursive_on(&self) -> bool {
        self.recursive.unwrap_or(0) != 0
    }

    pub(crate) fn apply_entry(
        &mut self,
        idx: usize,
        arg: SetArg<'_>,
        token: &str,
    ) -> Result<(), OptionError> {
        let parse_i32 = |v: &str| {
            v.parse::<i32>()
                .map_err(|_| OptionError::InvalidNumber(v.to_owned()))
        };
        match TABLE[idx].target {
            Target::Flag(field) => {
                *field(self) = match arg {
                    SetArg::Switch => 1,
                    SetArg::Negate => 0,
                    SetArg::Value(v) => parse_i32(v)?,
                };
            }
            Target::TriFlag(field) => {
                *field(self) = match arg {
                    SetArg::Switch => Some(1),
                    SetArg::Negate => Some(0),
                    SetArg::Value(v) => Some(parse_i32(v)?),
                };
            }
            Target::Count(field) => match arg {
                SetArg::Switch => *field(self) += 1,
                SetArg::Negate => *field(self) = 0,
                SetArg::Value(v) => *field(self) = parse_i32(v)?,
            },
            Target::Str(field) => match arg {
                SetArg::Switch => {
                    return Err(OptionError::MissingValue(format!("--{token}")));
                }
                SetArg::Negate => *field(self) = None,
                SetArg::Value(v) => *field(self) = Some(v.to_owned()),
            },
            Target::Int(field) => match arg {
                SetArg::Switch => {
                    return Err(OptionError::MissingValue(format!("--{token}")));
                }
                SetArg::Negate => *field(self) = None,
                SetArg::Value(v) => {
                    *field(self) = Some(
                        v.parse::<i64>()
                            .map_err(|_| OptionError::InvalidNumber(v.to_owned()))?,
                    );
                }
            },
            Target::Size(field, default_suffix) => match arg {
                SetArg::Switch => {
                    return Err(OptionError::MissingValue(format!("--{token}")));
                }
                SetArg::Negate => *field(self) = None,
                SetArg::Value(v) => *field(self) = Some(parse_size(v, default_suffix)?),
            },
            Target::Special(setter) => setter(self, arg)?,
        }
        Ok(())
    }
}

// manual overrides referenced from the table

fn require_value<'a>(arg: SetArg<'a>, name: &str) -> Result<&'a str, OptionError> {
    match arg {
        SetArg::Value(v) => Ok(v),
        SetArg::Switch | SetArg::Negate => Err(OptionError::MissingValue(format!("--{name}"))),
    }
}

/// `-a`: recursion (only while unset) plus the whole metadata family.
pub(crate) fn opt_archive(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    if matches!(arg, SetArg::Negate | SetArg::Value("0")) {
        o.archive = 0;
        return Ok(());
    }
    o.archive = 1;
    if o.recursive.is_none() {
        o.recursive = Some(1);
    }
    o.links = 1;
    o.perms = 1;
    o.times = 1;
    o.group = 1;
    o.owner = 1;
    o.devices = 1;
    o.specials = 1;
    Ok(())
}

/// `-D` / `--no-D`: combined devices + specials toggle.
pub(crate) fn opt_devspec(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let on = match arg {
        SetArg::Switch => 1,
        SetArg::Negate => 0,
        SetArg::Value(v) => v
            .parse::<i32>()
            .map_err(|_| OptionError::InvalidNumber(v.to_owned()))?,
    };
    o.devices = on;
    o.specials = on;
    Ok(())
}

/// `-F`: first use pulls in per-directory merge files, second hides them.
pub(crate) fn opt_filter_shorthand(o: &mut Options, _arg: SetArg<'_>) -> Result<(), OptionError> {
    const MERGE_RULE: &str = ": /.rsync-filter";
    const HIDE_RULE: &str = "- .rsync-filter";
    if !o.filters.iter().any(|f| f == MERGE_RULE) {
        o.filters.push(MERGE_RULE.to_owned());
    } else if !o.filters.iter().any(|f| f == HIDE_RULE) {
        o.filters.push(HIDE_RULE.to_owned());
    }
    Ok(())
}

pub(crate) fn opt_filter(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "filter")?;
    o.filters.push(v.to_owned());
    Ok(())
}

pub(crate) fn opt_include(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "include")?;
    o.filters.push(format!("+ {v}"));
    Ok(())
}

pub(crate) fn opt_exclude(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "exclude")?;
    o.filters.push(format!("- {v}"));
    Ok(())
}

pub(crate) fn opt_include_from(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "include-from")?;
    o.filters.push(format!("merge,+ {v}"));
    Ok(())
}

pub(crate) fn opt_exclude_from(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "exclude-from")?;
    o.filters.push(format!("merge,- {v}"));
    Ok(())
}

/// `--partial[=N]`: a truthy value drags `--progress` along.
pub(crate) fn opt_partial(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    match arg {
        SetArg::Switch => {
            o.partial = 1;
            o.progress = 1;
        }
        SetArg::Negate => o.partial = 0,
        SetArg::Value(v) => {
            o.partial = v
                .parse::<i32>()
                .map_err(|_| OptionError::InvalidNumber(v.to_owned()))?;
            if o.partial != 0 {
                o.progress = 1;
            }
        }
    }
    Ok(())
}

/// `-P` is shorthand for `--partial --progress`.
pub(crate) fn opt_partial_progress(o: &mut Options, _arg: SetArg<'_>) -> Result<(), OptionError> {
    o.partial = 1;
    o.progress = 1;
    Ok(())
}

/// `--append` counts on the server side, latches on the client side.
pub(crate) fn opt_append(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    match arg {
        SetArg::Negate => o.append = 0,
        SetArg::Switch | SetArg::Value(_) => {
            if o.server != 0 {
                o.append += 1;
            } else {
                o.append = 1;
            }
        }
    }
    Ok(())
}

pub(crate) fn opt_link_dest(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "link-dest")?;
    o.basis_dirs.push(v.to_owned());
    o.link_dest = 1;
    Ok(())
}

pub(crate) fn opt_copy_dest(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "copy-dest")?;
    o.basis_dirs.push(v.to_owned());
    o.copy_dest = 1;
    Ok(())
}

pub(crate) fn opt_compare_dest(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "compare-dest")?;
    o.basis_dirs.push(v.to_owned());
    o.compare_dest = 1;
    Ok(())
}

/// `--chown=u[:g]` rides on the map options, same single-use guard.
pub(crate) fn opt_chown(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "chown")?;
    let (user, group) = match v.split_once(':') {
        Some((u, g)) => (u, Some(g)),
        None => (v, None),
    };
    if !user.is_empty() {
        opt_usermap(o, SetArg::Value(&format!("*:{user}")))?;
    }
    if let Some(g) = group
        && !g.is_empty()
    {
        opt_groupmap(o, SetArg::Value(&format!("*:{g}")))?;
    }
    Ok(())
}

pub(crate) fn opt_usermap(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "usermap")?;
    if o.usermap.is_some() {
        return Err(OptionError::AlreadySet("usermap"));
    }
    o.usermap = Some(v.to_owned());
    Ok(())
}

pub(crate) fn opt_groupmap(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "groupmap")?;
    if o.groupmap.is_some() {
        return Err(OptionError::AlreadySet("groupmap"));
    }
    o.groupmap = Some(v.to_owned());
    Ok(())
}

/// `-A` implies `--perms`.
pub(crate) fn opt_acls(o: &mut Options, _arg: SetArg<'_>) -> Result<(), OptionError> {
    o.acls = 1;
    o.perms = 1;
    Ok(())
}

/// `-M`: must look like an option itself; slot 0 stays reserved for the
/// remote argv[0].
pub(crate) fn opt_remote_option(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "remote-option")?;
    if !v.starts_with('-') {
        return Err(OptionError::RemoteOptionSyntax(v.to_owned()));
    }
    if o.remote_options.is_empty() {
        o.remote_options.push(String::new());
    }
    o.remote_options.push(v.to_owned());
    Ok(())
}

pub(crate) fn opt_read_batch(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "read-batch")?;
    o.batch_name = Some(v.to_owned());
    o.read_batch = 1;
    Ok(())
}

pub(crate) fn opt_write_batch(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "write-batch")?;
    o.batch_name = Some(v.to_owned());
    o.write_batch = 1;
    Ok(())
}

pub(crate) fn opt_only_write_batch(o: &mut Options, arg: SetArg<'_>) -> Result<(), OptionError> {
    let v = require_value(arg, "only-write-batch")?;
    o.batch_name = Some(v.to_owned());
    o.write_batch = -1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::table::{LOOKUP, TABLE, parse_spec};
    use super::*;

    #[test]
    fn spec_strings_parse() {
        let info = parse_spec("one-file-system|x+");
        assert_eq!(info.names, vec!["one-file-system", "x"]);
        assert!(info.incrementer);
        assert!(!info.negatable);
        assert_eq!(info.value_type, None);

        let info = parse_spec("verbose|v!+");
        assert!(info.negatable && info.incrementer);

        let info = parse_spec("max-size=S");
        assert_eq!(info.value_type, Some('S'));

        let info = parse_spec("remote-option|M=s");
        assert_eq!(info.names, vec!["remote-option", "M"]);
        assert_eq!(info.value_type, Some('s'));
    }

    #[test]
    fn every_table_entry_accepts_a_representative_invocation() {
        for (idx, _) in TABLE.iter().enumerate() {
            let info = &LOOKUP.info[idx];
            let name = info.names[0];
            // fresh record per entry so single-assignment guards stay quiet
            let mut o = Options::new();
            let result = match info.value_type {
                None => o.set(name, None),
                Some('i') => o.set(name, Some("3")),
                Some('S') => o.set(name, Some("10k")),
                Some(_) => {
                    let v = if name == "remote-option" { "-x" } else { "x" };
                    o.set(name, Some(v))
                }
            };
            result.unwrap_or_else(|e| panic!("--{name}: {e}"));
        }
    }

    #[test]
    fn aliases_and_underscores_resolve() {
        let mut o = Options::new();
        o.set("one_file_system", None).unwrap();
        o.set("x", None).unwrap();
        assert_eq!(o.one_file_system, 2);
        o.set("old-d", None).unwrap();
        assert_eq!(o.old_dirs, 1);
        o.set("del", None).unwrap();
        assert_eq!(o.delete_during, 1);
        assert!(o.set("no-such-option", None).is_err());
    }

    #[test]
    fn negation_honours_the_table() {
        let mut o = Options::new();
        o.set_no("motd").unwrap();
        assert_eq!(o.motd, 0);
        // --delete has no --no- form
        assert!(o.set_no("delete").is_err());
    }

    #[test]
    fn archive_forces_the_family_but_respects_explicit_recursion() {
        let mut o = Options::new();
        o.set("archive", None).unwrap();
        assert_eq!(o.recursive, Some(1));
        assert_eq!(
            (o.links, o.perms, o.times, o.group, o.owner, o.devices, o.specials),
            (1, 1, 1, 1, 1, 1, 1)
        );

        let mut o = Options::new();
        o.set_no("recursive").unwrap();
        o.set("archive", None).unwrap();
        assert_eq!(o.recursive, Some(0), "explicit --no-r survives -a");
    }

    #[test]
    fn devspec_toggles_both_ways() {
        let mut o = Options::new();
        o.set("D", None).unwrap();
        assert_eq!((o.devices, o.specials), (1, 1));
        o.set_no("D").unwrap();
        assert_eq!((o.devices, o.specials), (0, 0));
    }

    #[test]
    fn filter_shorthand_two_stage() {
        let mut o = Options::new();
        o.set("F", None).unwrap();
        assert_eq!(o.filters, vec![": /.rsync-filter"]);
        o.set("F", None).unwrap();
        assert_eq!(o.filters, vec![": /.rsync-filter", "- .rsync-filter"]);
        o.set("F", None).unwrap();
        assert_eq!(o.filters.len(), 2);
    }

    #[test]
    fn filter_family_normalises_signs() {
        let mut o = Options::new();
        o.set("include", Some("*.c")).unwrap();
        o.set("exclude", Some("*.o")).unwrap();
        o.set("include-from", Some("keep.lst")).unwrap();
        o.set("exclude-from", Some("drop.lst")).unwrap();
        o.set("filter", Some("dir-merge .rules")).unwrap();
        assert_eq!(
            o.filters,
            vec![
                "+ *.c",
                "- *.o",
                "merge,+ keep.lst",
                "merge,- drop.lst",
                "dir-merge .rules",
            ]
        );
    }

    #[test]
    fn partial_value_drags_progress() {
        let mut o = Options::new();
        o.set("partial", Some("2")).unwrap();
        assert_eq!((o.partial, o.progress), (2, 1));

        let mut o = Options::new();
        o.set("partial", Some("0")).unwrap();
        assert_eq!((o.partial, o.progress), (0, 0));
        o.set_no("partial").unwrap();
        assert_eq!(o.partial, 0);
    }

    #[test]
    fn append_counts_only_on_the_server() {
        let mut o = Options::new();
        o.set("append", None).unwrap();
        o.set("append", None).unwrap();
        assert_eq!(o.append, 1);

        let mut o = Options::new();
        o.set("server", None).unwrap();
        o.set("append", None).unwrap();
        o.set("append", None).unwrap();
        assert_eq!(o.append, 2);
    }

    #[test]
    fn basis_dir_family() {
        let mut o = Options::new();
        o.set("link-dest", Some("../prev")).unwrap();
        o.set("compare-dest", Some("../base")).unwrap();
        assert_eq!(o.basis_dirs, vec!["../prev", "../base"]);
        assert_eq!((o.link_dest, o.compare_dest, o.copy_dest), (1, 1, 0));
    }

    #[test]
    fn chown_expands_to_maps_and_respects_single_use() {
        let mut o = Options::new();
        o.set("chown", Some("alice:staff")).unwrap();
        assert_eq!(o.usermap.as_deref(), Some("*:alice"));
        assert_eq!(o.groupmap.as_deref(), Some("*:staff"));

        let mut o = Options::new();
        o.set("chown", Some("alice")).unwrap();
        assert_eq!(o.usermap.as_deref(), Some("*:alice"));
        assert_eq!(o.groupmap, None);

        let mut o = Options::new();
        o.set("usermap", Some("0-99:root")).unwrap();
        assert!(matches!(
            o.set("usermap", Some("again")),
            Err(OptionError::AlreadySet("usermap"))
        ));
        assert!(matches!(
            o.set("chown", Some("bob")),
            Err(OptionError::AlreadySet("usermap"))
        ));
    }

    #[test]
    fn remote_options_keep_the_reserved_slot() {
        let mut o = Options::new();
        o.set("remote-option", Some("--log-file=x")).unwrap();
        o.set("M", Some("-v")).unwrap();
        assert_eq!(o.remote_options, vec!["", "--log-file=x", "-v"]);
        assert!(matches!(
            o.set("M", Some("oops")),
            Err(OptionError::RemoteOptionSyntax(_))
        ));
    }

    #[test]
    fn batch_options_share_the_name_slot() {
        let mut o = Options::new();
        o.set("write-batch", Some("b1")).unwrap();
        assert_eq!((o.write_batch, o.batch_name.as_deref()), (1, Some("b1")));
        o.set("only-write-batch", Some("b2")).unwrap();
        assert_eq!((o.write_batch, o.batch_name.as_deref()), (-1, Some("b2")));
        o.set("read-batch", Some("b3")).unwrap();
        assert_eq!((o.read_batch, o.batch_name.as_deref()), (1, Some("b3")));
    }

    #[test]
    fn coherence_pass() {
        let mut o = Options::new();
        o.checksum_choice = Some("none".to_owned());
        o.make_coherent().unwrap();
        assert_eq!(o.whole_file, 1);

        let mut o = Options::new();
        o.checksum_choice = Some("sha1".to_owned());
        assert!(matches!(
            o.make_coherent(),
            Err(OptionError::InvalidChecksumChoice(_))
        ));

        let mut o = Options::new();
        o.make_coherent().unwrap();
        assert_eq!(o.whole_file, 0);
    }

    #[test]
    fn acls_force_perms() {
        let mut o = Options::new();
        o.set("A", None).unwrap();
        assert_eq!((o.acls, o.perms), (1, 1));
    }
}
