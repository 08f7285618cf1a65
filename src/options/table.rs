//! The declarative option table.
//!
//! Each entry is a spec string `name[|alias...][!][+][=T]`: `!` marks a
//! `--no-` form, `+` an incrementer, `=s`/`=i`/`=S` a mandatory string /
//! integer / size value. Each spec pairs with a storage target; single-character
//! aliases double as short options in bundles. The argv grammar is the
//! reference tool's own, because the daemon transmits argv verbatim and
//! both ends must agree on it.

use super::{OptionError, Options, SetArg};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Where and how a table entry stores its value.
pub(crate) enum Target {
    /// Plain numeric boolean: set to 1, `--no-` sets 0.
    Flag(fn(&mut Options) -> &mut i32),
    /// Tri-state boolean that remembers "never set" (`--archive` only
    /// forces recursion while it is unset).
    TriFlag(fn(&mut Options) -> &mut Option<i32>),
    /// Each occurrence adds one.
    Count(fn(&mut Options) -> &mut i32),
    Str(fn(&mut Options) -> &mut Option<String>),
    Int(fn(&mut Options) -> &mut Option<i64>),
    /// Size-suffixed value with this default suffix.
    Size(fn(&mut Options) -> &mut Option<i64>, char),
    /// Hand-written setter with non-trivial semantics.
    Special(fn(&mut Options, SetArg<'_>) -> Result<(), OptionError>),
}

pub(crate) struct OptDesc {
    pub spec: &'static str,
    pub target: Target,
}

use super::{
    opt_acls, opt_append, opt_archive, opt_chown, opt_compare_dest, opt_copy_dest, opt_devspec,
    opt_exclude, opt_exclude_from, opt_filter, opt_filter_shorthand, opt_groupmap, opt_include,
    opt_include_from, opt_link_dest, opt_only_write_batch, opt_partial, opt_partial_progress,
    opt_read_batch, opt_remote_option, opt_usermap, opt_write_batch,
};

pub(crate) static TABLE: &[OptDesc] = &[
    OptDesc { spec: "help", target: Target::Flag(|o| &mut o.help) },
    OptDesc { spec: "version|V", target: Target::Flag(|o| &mut o.version) },
    OptDesc { spec: "verbose|v!+", target: Target::Count(|o| &mut o.verbose) },
    OptDesc { spec: "info=s", target: Target::Str(|o| &mut o.info) },
    OptDesc { spec: "debug=s", target: Target::Str(|o| &mut o.debug) },
    OptDesc { spec: "msgs2stderr", target: Target::Flag(|o| &mut o.msgs2stderr) },
    OptDesc { spec: "quiet|q+", target: Target::Count(|o| &mut o.quiet) },
    OptDesc { spec: "motd!", target: Target::Flag(|o| &mut o.motd) },
    OptDesc { spec: "checksum|c", target: Target::Flag(|o| &mut o.checksum) },
    OptDesc { spec: "checksum-choice|cc=s", target: Target::Str(|o| &mut o.checksum_choice) },
    OptDesc { spec: "archive|a", target: Target::Special(opt_archive) },
    OptDesc { spec: "recursive|r!", target: Target::TriFlag(|o| &mut o.recursive) },
    OptDesc { spec: "relative|R!", target: Target::Flag(|o| &mut o.relative) },
    OptDesc { spec: "implied-dirs!", target: Target::Flag(|o| &mut o.implied_dirs) },
    OptDesc { spec: "backup|b", target: Target::Flag(|o| &mut o.backup) },
    OptDesc { spec: "backup-dir=s", target: Target::Str(|o| &mut o.backup_dir) },
    OptDesc { spec: "suffix=s", target: Target::Str(|o| &mut o.suffix) },
    OptDesc { spec: "update|u", target: Target::Flag(|o| &mut o.update) },
    OptDesc { spec: "inplace!", target: Target::Flag(|o| &mut o.inplace) },
    OptDesc { spec: "append", target: Target::Special(opt_append) },
    OptDesc { spec: "append-verify", target: Target::Flag(|o| &mut o.append_verify) },
    OptDesc { spec: "dirs|d!", target: Target::Flag(|o| &mut o.dirs) },
    OptDesc { spec: "old-dirs|old-d", target: Target::Flag(|o| &mut o.old_dirs) },
    OptDesc { spec: "links|l!", target: Target::Flag(|o| &mut o.links) },
    OptDesc { spec: "copy-links|L", target: Target::Flag(|o| &mut o.copy_links) },
    OptDesc { spec: "copy-unsafe-links", target: Target::Flag(|o| &mut o.copy_unsafe_links) },
    OptDesc { spec: "safe-links", target: Target::Flag(|o| &mut o.safe_links) },
    OptDesc { spec: "munge-links", target: Target::Flag(|o| &mut o.munge_links) },
    OptDesc { spec: "copy-dirlinks|k", target: Target::Flag(|o| &mut o.copy_dirlinks) },
    OptDesc { spec: "keep-dirlinks|K", target: Target::Flag(|o| &mut o.keep_dirlinks) },
    OptDesc { spec: "hard-links|H!", target: Target::Flag(|o| &mut o.hard_links) },
    OptDesc { spec: "perms|p!", target: Target::Flag(|o| &mut o.perms) },
    OptDesc { spec: "executability|E", target: Target::Flag(|o| &mut o.executability) },
    OptDesc { spec: "chmod=s", target: Target::Str(|o| &mut o.chmod) },
    OptDesc { spec: "acls|A", target: Target::Special(opt_acls) },
    OptDesc { spec: "xattrs|X", target: Target::Flag(|o| &mut o.xattrs) },
    OptDesc { spec: "owner|o!", target: Target::Flag(|o| &mut o.owner) },
    OptDesc { spec: "group|g!", target: Target::Flag(|o| &mut o.group) },
    OptDesc { spec: "devices!", target: Target::Flag(|o| &mut o.devices) },
    OptDesc { spec: "specials!", target: Target::Flag(|o| &mut o.specials) },
    OptDesc { spec: "D!", target: Target::Special(opt_devspec) },
    OptDesc { spec: "times|t!", target: Target::Flag(|o| &mut o.times) },
    OptDesc { spec: "omit-dir-times|O!", target: Target::Flag(|o| &mut o.omit_dir_times) },
    OptDesc { spec: "omit-link-times|J!", target: Target::Flag(|o| &mut o.omit_link_times) },
    OptDesc { spec: "super!", target: Target::Flag(|o| &mut o.super_mode) },
    OptDesc { spec: "fake-super", target: Target::Flag(|o| &mut o.fake_super) },
    OptDesc { spec: "sparse|S!", target: Target::Flag(|o| &mut o.sparse) },
    OptDesc { spec: "preallocate", target: Target::Flag(|o| &mut o.preallocate) },
    OptDesc { spec: "dry-run|n", target: Target::Flag(|o| &mut o.dry_run) },
    OptDesc { spec: "whole-file|W!", target: Target::Flag(|o| &mut o.whole_file) },
    OptDesc { spec: "one-file-system|x+", target: Target::Count(|o| &mut o.one_file_system) },
    OptDesc { spec: "block-size|B=i", target: Target::Int(|o| &mut o.block_size) },
    OptDesc { spec: "rsh|e=s", target: Target::Str(|o| &mut o.rsh) },
    OptDesc { spec: "rsync-path=s", target: Target::Str(|o| &mut o.rsync_path) },
    OptDesc { spec: "existing|ignore-non-existing", target: Target::Flag(|o| &mut o.existing) },
    OptDesc { spec: "ignore-existing", target: Target::Flag(|o| &mut o.ignore_existing) },
    OptDesc { spec: "remove-source-files", target: Target::Flag(|o| &mut o.remove_source_files) },
    OptDesc { spec: "delete", target: Target::Flag(|o| &mut o.delete) },
    OptDesc { spec: "delete-before", target: Target::Flag(|o| &mut o.delete_before) },
    OptDesc { spec: "delete-during|del", target: Target::Flag(|o| &mut o.delete_during) },
    OptDesc { spec: "delete-delay", target: Target::Flag(|o| &mut o.delete_delay) },
    OptDesc { spec: "delete-after", target: Target::Flag(|o| &mut o.delete_after) },
    OptDesc { spec: "delete-excluded", target: Target::Flag(|o| &mut o.delete_excluded) },
    OptDesc { spec: "ignore-missing-args", target: Target::Flag(|o| &mut o.ignore_missing_args) },
    OptDesc { spec: "delete-missing-args", target: Target::Flag(|o| &mut o.delete_missing_args) },
    OptDesc { spec: "force", target: Target::Flag(|o| &mut o.force) },
    OptDesc { spec: "max-delete=i", target: Target::Int(|o| &mut o.max_delete) },
    OptDesc { spec: "max-size=S", target: Target::Size(|o| &mut o.max_size, 'b') },
    OptDesc { spec: "min-size=S", target: Target::Size(|o| &mut o.min_size, 'b') },
    OptDesc { spec: "partial!", target: Target::Special(opt_partial) },
    OptDesc { spec: "partial-dir=s", target: Target::Str(|o| &mut o.partial_dir) },
    OptDesc { spec: "delay-updates", target: Target::Flag(|o| &mut o.delay_updates) },
    OptDesc { spec: "prune-empty-dirs|m!", target: Target::Flag(|o| &mut o.prune_empty_dirs) },
    OptDesc { spec: "numeric-ids!", target: Target::Flag(|o| &mut o.numeric_ids) },
    OptDesc { spec: "usermap=s", target: Target::Special(opt_usermap) },
    OptDesc { spec: "groupmap=s", target: Target::Special(opt_groupmap) },
    OptDesc { spec: "chown=s", target: Target::Special(opt_chown) },
    OptDesc { spec: "timeout=i", target: Target::Int(|o| &mut o.timeout) },
    OptDesc { spec: "contimeout=i", target: Target::Int(|o| &mut o.contimeout) },
    OptDesc { spec: "ignore-times|I", target: Target::Flag(|o| &mut o.ignore_times) },
    OptDesc { spec: "size-only", target: Target::Flag(|o| &mut o.size_only) },
    OptDesc { spec: "modify-window=i", target: Target::Int(|o| &mut o.modify_window) },
    OptDesc { spec: "temp-dir|T=s", target: Target::Str(|o| &mut o.temp_dir) },
    OptDesc { spec: "fuzzy|y+", target: Target::Count(|o| &mut o.fuzzy) },
    OptDesc { spec: "compare-dest=s", target: Target::Special(opt_compare_dest) },
    OptDesc { spec: "copy-dest=s", target: Target::Special(opt_copy_dest) },
    OptDesc { spec: "link-dest=s", target: Target::Special(opt_link_dest) },
    OptDesc { spec: "compress|z!", target: Target::Flag(|o| &mut o.compress) },
    OptDesc { spec: "compress-level=i", target: Target::Int(|o| &mut o.compress_level) },
    OptDesc { spec: "skip-compress=s", target: Target::Str(|o| &mut o.skip_compress) },
    OptDesc { spec: "cvs-exclude|C", target: Target::Flag(|o| &mut o.cvs_exclude) },
    OptDesc { spec: "F+", target: Target::Special(opt_filter_shorthand) },
    OptDesc { spec: "filter|f=s", target: Target::Special(opt_filter) },
    OptDesc { spec: "exclude=s", target: Target::Special(opt_exclude) },
    OptDesc { spec: "exclude-from=s", target: Target::Special(opt_exclude_from) },
    OptDesc { spec: "include=s", target: Target::Special(opt_include) },
    OptDesc { spec: "include-from=s", target: Target::Special(opt_include_from) },
    OptDesc { spec: "files-from=s", target: Target::Str(|o| &mut o.files_from) },
    OptDesc { spec: "from0|0!", target: Target::Flag(|o| &mut o.from0) },
    OptDesc { spec: "protect-args|s!", target: Target::Flag(|o| &mut o.protect_args) },
    OptDesc { spec: "address=s", target: Target::Str(|o| &mut o.address) },
    OptDesc { spec: "port=i", target: Target::Int(|o| &mut o.port) },
    OptDesc { spec: "sockopts=s", target: Target::Str(|o| &mut o.sockopts) },
    OptDesc { spec: "blocking-io!", target: Target::Flag(|o| &mut o.blocking_io) },
    OptDesc { spec: "stats", target: Target::Flag(|o| &mut o.stats) },
    OptDesc { spec: "8-bit-output|8", target: Target::Flag(|o| &mut o.eight_bit_output) },
    OptDesc { spec: "human-readable|h!+", target: Target::Count(|o| &mut o.human_readable) },
    OptDesc { spec: "progress!", target: Target::Flag(|o| &mut o.progress) },
    OptDesc { spec: "P", target: Target::Special(opt_partial_progress) },
    OptDesc { spec: "itemize-changes|i+", target: Target::Count(|o| &mut o.itemize_changes) },
    OptDesc { spec: "out-format|log-format=s", target: Target::Str(|o| &mut o.out_format) },
    OptDesc { spec: "log-file=s", target: Target::Str(|o| &mut o.log_file) },
    OptDesc { spec: "log-file-format=s", target: Target::Str(|o| &mut o.log_file_format) },
    OptDesc { spec: "password-file=s", target: Target::Str(|o| &mut o.password_file) },
    OptDesc { spec: "list-only", target: Target::Flag(|o| &mut o.list_only) },
    OptDesc { spec: "bwlimit=S", target: Target::Size(|o| &mut o.bwlimit, 'K') },
    OptDesc { spec: "outbuf=s", target: Target::Str(|o| &mut o.outbuf) },
    OptDesc { spec: "write-batch=s", target: Target::Special(opt_write_batch) },
    OptDesc { spec: "only-write-batch=s", target: Target::Special(opt_only_write_batch) },
    OptDesc { spec: "read-batch=s", target: Target::Special(opt_read_batch) },
    OptDesc { spec: "protocol=i", target: Target::Int(|o| &mut o.protocol) },
    OptDesc { spec: "iconv=s", target: Target::Str(|o| &mut o.iconv) },
    OptDesc { spec: "checksum-seed=i", target: Target::Int(|o| &mut o.checksum_seed) },
    OptDesc { spec: "ipv4|4", target: Target::Flag(|o| &mut o.ipv4) },
    OptDesc { spec: "ipv6|6", target: Target::Flag(|o| &mut o.ipv6) },
    OptDesc { spec: "remote-option|M=s", target: Target::Special(opt_remote_option) },
    OptDesc { spec: "server", target: Target::Flag(|o| &mut o.server) },
    OptDesc { spec: "sender", target: Target::Flag(|o| &mut o.sender) },
    OptDesc { spec: "daemon", target: Target::Flag(|o| &mut o.daemon) },
    OptDesc { spec: "config=s", target: Target::Str(|o| &mut o.config) },
    OptDesc { spec: "dparam=s", target: Target::Str(|o| &mut o.dparam) },
    OptDesc { spec: "detach!", target: Target::Flag(|o| &mut o.detach) },
    OptDesc { spec: "inc-recursive|i-r!", target: Target::Flag(|o| &mut o.inc_recursive) },
    OptDesc { spec: "ignore-errors", target: Target::Flag(|o| &mut o.ignore_errors) },
];

/// A table entry's spec string, digested.
pub(crate) struct SpecInfo {
    pub names: Vec<&'static str>,
    pub negatable: bool,
    pub incrementer: bool,
    /// `s`, `i`, or `S` when the option demands a value.
    pub value_type: Option<char>,
}

pub(crate) fn parse_spec(spec: &'static str) -> SpecInfo {
    let (mut body, value_type) = match spec.split_once('=') {
        Some((b, t)) => (b, t.chars().next()),
        None => (spec, None),
    };
    let mut negatable = false;
    let mut incrementer = false;
    loop {
        if let Some(stripped) = body.strip_suffix('!') {
            body = stripped;
            negatable = true;
        } else if let Some(stripped) = body.strip_suffix('+') {
            body = stripped;
            incrementer = true;
        } else {
            break;
        }
    }
    SpecInfo {
        names: body.split('|').collect(),
        negatable,
        incrementer,
        value_type,
    }
}

/// Hyphens and underscores are interchangeable in option names.
pub(crate) fn canonical(name: &str) -> String {
    name.replace('-', "_")
}

pub(crate) struct Lookup {
    pub by_name: HashMap<String, usize>,
    pub info: Vec<SpecInfo>,
}

impl Lookup {
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(&canonical(name)).copied()
    }
}

pub(crate) static LOOKUP: LazyLock<Lookup> = LazyLock::new(|| {
    let mut by_name = HashMap::new();
    let mut info = Vec::with_capacity(TABLE.len());
    for (idx, desc) in TABLE.iter().enumerate() {
        let parsed = parse_spec(desc.spec);
        for name in &parsed.names {
            let prior = by_name.insert(canonical(name), idx);
            debug_assert!(prior.is_none(), "duplicate option name {name}");
        }
        info.push(parsed);
    }
    Lookup { by_name, info }
});
