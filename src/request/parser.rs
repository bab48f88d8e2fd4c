//! Source/signal request parser.
//!
//! Turns the two client strings into a [`RequestDescriptor`]:
//!
//! ```text
//! source:  [DEVICE::]  ( pulse[/pass] | /path/file.ext | function(args) )
//!          FORMAT::rest    LIBRARY::function(args)    FOREIGN-DEVICE::rest
//!
//! signal:  [ARCHIVE::] name [subset]
//!          [LIBRARY::] function(args) [subset]
//! ```
//!
//! The source is interpreted first. Its decisions about the reader win over
//! anything the signal implies; a conflicting signal library is logged and
//! ignored.
//!
//! # Example
//!
//! ```
//! use uda_core::config::Config;
//! use uda_core::error_stack::ErrorStack;
//! use uda_core::request::{PluginRegistry, RequestKind, RequestParser};
//!
//! let config = Config::default();
//! let registry = PluginRegistry::with_standard_plugins();
//! let parser = RequestParser::new(&config, &registry);
//! let mut stack = ErrorStack::new();
//!
//! let request = parser.parse("99999/3", "ip", "", &mut stack).unwrap();
//! assert_eq!(request.request, RequestKind::Generic);
//! assert_eq!(request.exp_number, 99999);
//! assert_eq!(request.pass, 3);
//! ```

use crate::config::Config;
use crate::error::{Result, UdaError};
use crate::error_stack::ErrorStack;
use crate::path::{expand_env_vars, EnvLookup, ProcessEnv};
use crate::protocol::STRING_LENGTH;
use crate::request::decompose::{decompose_mds, decompose_server_url, decompose_sql};
use crate::request::format::identify_file_format;
use crate::request::{
    extract_subset, parse_pairs, PluginClass, PluginRegistry, RequestDescriptor, RequestKind,
    SERVERSIDE_FORMAT,
};
use crate::strings::{basename, is_legal_file_path, is_number, strip_prefix_ignore_case};

const LOCATION: &str = "make_request_data";

/// What the source branch found out about the request.
#[derive(Debug, Default, Clone, Copy)]
struct SourceFlags {
    is_server: bool,
    /// Prefix was not in the registry; the signal is passed on untouched.
    is_foreign: bool,
}

enum SourceOutcome {
    Parsed(SourceFlags),
    /// A device prefix expanded into a new source.
    Redirect(String),
}

/// Name of the function called in `text`: the text before the first `(`
/// with every `LIBRARY<delim>` qualifier removed.
///
/// ```
/// use uda_core::request::extract_function_name;
///
/// assert_eq!(extract_function_name("LIB::SUB::fn(a=1)", "::"), "fn");
/// assert_eq!(extract_function_name("no_call", "::"), "");
/// ```
pub fn extract_function_name(text: &str, delim: &str) -> String {
    let Some(open) = text.find('(') else {
        return String::new();
    };
    let mut name = text[..open].trim();
    if !delim.is_empty() {
        while let Some(i) = name.find(delim) {
            name = name[i + delim.len()..].trim();
        }
    }
    name.to_string()
}

/// Library qualifying the function call in `text`, if any.
fn function_library<'t>(text: &'t str, delim: &str) -> Option<&'t str> {
    let head = &text[..text.find('(')?];
    let end = head.rfind(delim)?;
    let qualifier = head[..end].rsplit(delim).next()?.trim();
    (!qualifier.is_empty()).then_some(qualifier)
}

/// Check the parenthesis layout of a call: both present, no `/` before the
/// `(` and none after the `)`.
///
/// `/a/b/fun(x)` is a (bad) file path, `fun(a/b/c)` is a function.
fn is_function_call(text: &str) -> bool {
    let (Some(open), Some(close)) = (text.find('('), text.find(')')) else {
        return false;
    };
    if text.find('/').is_some_and(|slash| slash < open) {
        return false;
    }
    if text.rfind('/').is_some_and(|slash| slash > close) {
        return false;
    }
    true
}

/// Arguments between the first `(` and the first `)` after it.
fn first_call_args(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let close = text[open..].find(')')? + open;
    Some(text[open + 1..close].trim())
}

/// Arguments between the first `(` and the last `)`.
fn outer_call_args(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    (close > open).then(|| text[open + 1..close].trim())
}

/// Recognize `pulse` and `pulse/pass` sources.
///
/// Returns `true` and fills `exp_number` and `pass`/`tpass` when the
/// source is a generic request.
fn generic_request_test(source: &str, request: &mut RequestDescriptor) -> bool {
    if source.is_empty() || source.starts_with('/') {
        return false;
    }

    let mut tokens = source.split('/').filter(|t| !t.is_empty());
    let Some(pulse) = tokens.next() else {
        return false;
    };
    if !is_number(pulse) {
        return false;
    }
    let Ok(exp_number) = pulse.parse::<i32>() else {
        return false;
    };

    request.request = RequestKind::Generic;
    request.exp_number = exp_number;
    request.path.clear();

    if let Some(pass) = tokens.next() {
        match pass.parse::<i32>() {
            Ok(number) if is_number(pass) => request.pass = number,
            _ => request.tpass = pass.to_string(),
        }
    }

    tracing::debug!(exp_number, pass = request.pass, tpass = %request.tpass, "generic request");
    true
}

/// Parses client request strings against a configuration and registry.
pub struct RequestParser<'a> {
    config: &'a Config,
    registry: &'a PluginRegistry,
    env: &'a dyn EnvLookup,
}

impl<'a> RequestParser<'a> {
    /// Create a parser that reads `$NAME` values from the process environment.
    pub fn new(config: &'a Config, registry: &'a PluginRegistry) -> Self {
        Self {
            config,
            registry,
            env: &ProcessEnv,
        }
    }

    /// Use a different environment variable source.
    pub fn with_env(mut self, env: &'a dyn EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Parse a request.
    ///
    /// An empty `api_delim` selects the configured delimiter. Every failure
    /// is recorded on `stack` before it is returned.
    ///
    /// # Errors
    ///
    /// - `MissingRequest` when neither signal nor source carry anything
    /// - `Syntax` for malformed calls, paths, subsets or argument lists
    /// - `UnrecognizedFormat` for a bare path with no known format
    /// - `TooManyRedirects` when device substitution does not terminate
    /// - `AmbiguousMdsPath` for an MDS+ tree number without a tree name
    pub fn parse(
        &self,
        source: &str,
        signal: &str,
        api_delim: &str,
        stack: &mut ErrorStack,
    ) -> Result<RequestDescriptor> {
        self.parse_at_depth(source, signal, api_delim, 0, stack)
    }

    fn parse_at_depth(
        &self,
        source: &str,
        signal: &str,
        api_delim: &str,
        depth: usize,
        stack: &mut ErrorStack,
    ) -> Result<RequestDescriptor> {
        let delim = self.config.delim_or_default(api_delim).to_string();
        let source = source.trim();
        let signal = signal.trim();
        let mut request = RequestDescriptor::new(source, signal, &delim);

        let device = self.config.api_device.as_str();
        let default_device = format!("{}{}", device, delim);
        let default_archive = format!("{}{}", self.config.api_archive, delim);

        let no_source = source.is_empty()
            || source.eq_ignore_ascii_case(device)
            || source.eq_ignore_ascii_case(&default_device);

        if no_source && (signal.is_empty() || signal.eq_ignore_ascii_case(&default_archive)) {
            return Err(stack.record(LOCATION, UdaError::MissingRequest));
        }

        let mut work = source;
        if !no_source {
            if let Some(stripped) = strip_prefix_ignore_case(source, &default_device) {
                work = stripped.trim_start();
            }
        }

        if let Some(target) = &self.config.proxy_target {
            request.request = RequestKind::ReadUda;
            request.server = target.clone();
            request.device_name = device.to_string();
            request.archive = self.config.api_archive.clone();
            tracing::debug!(proxy = %target, "proxy request forwarded verbatim");
            return Ok(request);
        }

        let (mut prefix, mut rest, has_delim) = match work.find(delim.as_str()) {
            Some(i) => (work[..i].trim(), &work[i + delim.len()..], true),
            None => ("", work, false),
        };

        // DEVICE::LIBRARY::function(...) - the default device is transparent.
        if has_delim && prefix.eq_ignore_ascii_case(device) {
            if let Some(i) = rest.find(delim.as_str()) {
                prefix = rest[..i].trim();
                rest = rest[i + delim.len()..].trim_start();
            }
        }

        let mut flags = SourceFlags::default();
        let mut decompose_from = None;

        if no_source {
            request.device_name = device.to_string();
        } else if !has_delim || prefix.eq_ignore_ascii_case(device) {
            self.parse_plain_source(rest, signal, &mut request, stack)?;
        } else {
            match self.parse_prefixed_source(prefix, rest, &mut request, stack)? {
                SourceOutcome::Parsed(parsed) => {
                    flags = parsed;
                    decompose_from = Some(rest);
                }
                SourceOutcome::Redirect(new_source) => {
                    if depth + 1 > self.config.max_redirects {
                        return Err(stack.record(
                            LOCATION,
                            UdaError::TooManyRedirects(self.config.max_redirects),
                        ));
                    }
                    tracing::debug!(depth = depth + 1, source = %new_source, "device substituted");
                    return self.parse_at_depth(&new_source, signal, api_delim, depth + 1, stack);
                }
            }
        }

        self.parse_signal(&mut request, no_source, flags, stack)?;

        if let Some(text) = decompose_from {
            match request.request {
                RequestKind::Mds => {
                    decompose_mds(text, &mut request).map_err(|e| stack.record(LOCATION, e))?
                }
                RequestKind::ReadUda | RequestKind::ReadWeb => decompose_server_url(text, &mut request),
                RequestKind::Sql => decompose_sql(&mut request),
                _ => {}
            }
        }

        tracing::debug!(
            request = request.request.id(),
            format = %request.format,
            archive = %request.archive,
            signal = %request.signal,
            "request parsed"
        );
        Ok(request)
    }

    /// Source without a prefix (or with the default device as prefix).
    fn parse_plain_source(
        &self,
        work: &str,
        signal: &str,
        request: &mut RequestDescriptor,
        stack: &mut ErrorStack,
    ) -> Result<()> {
        request.device_name = self.config.api_device.clone();

        if generic_request_test(work, request) {
            return Ok(());
        }

        if !is_function_call(work) {
            if work.contains('/') && work.contains(['(', ')']) {
                return Err(stack.record(
                    LOCATION,
                    UdaError::Syntax("Source syntax: path with parenthesis () is incorrect!".into()),
                ));
            }
            return self.parse_file_source(work, request, stack);
        }

        let Some(args) = first_call_args(work) else {
            return Err(stack.record(
                LOCATION,
                UdaError::Syntax("No Data Access Plugin Identified!".into()),
            ));
        };

        request.request = RequestKind::ReadServerside;
        if let Some(entry) = self.registry.server_side_default() {
            request.request = entry.request;
            request.format = entry.format.clone();
        }
        request.function = extract_function_name(work, &request.api_delim);
        request.name_values = parse_pairs(args, true).map_err(|e| stack.record("name_value_pairs", e))?;

        // A library qualifier on the call, else an archive on the signal.
        let library = function_library(work, &request.api_delim).or_else(|| {
            signal
                .find(request.api_delim.as_str())
                .map(|i| signal[..i].trim())
                .filter(|archive| !archive.is_empty())
        });
        if let Some(entry) = library.and_then(|name| self.registry.by_format(name)) {
            request.request = entry.request;
            request.format = entry.format.clone();
        }

        tracing::debug!(function = %request.function, format = %request.format, "function source");
        Ok(())
    }

    /// Bare path source: the format comes from the file name or contents.
    fn parse_file_source(
        &self,
        work: &str,
        request: &mut RequestDescriptor,
        stack: &mut ErrorStack,
    ) -> Result<()> {
        let entry = identify_file_format(work, self.config, self.registry)
            .and_then(|format| self.registry.by_format(&format));
        let Some(entry) = entry else {
            return Err(stack.record(
                LOCATION,
                UdaError::UnrecognizedFormat(format!("Please specify ({})", work)),
            ));
        };

        // `/pulse/pass` in the default format
        if work.len() > 1 && work[1..].starts_with(|c: char| c.is_ascii_digit()) {
            generic_request_test(&work[1..], request);
        }

        request.request = entry.request;
        request.format = entry.format.clone();
        request.path = expand_env_vars(work, self.env);
        request.file = match entry.class {
            PluginClass::File => basename(work).to_string(),
            _ => String::new(),
        };

        tracing::debug!(format = %request.format, path = %request.path, "file format identified");
        Ok(())
    }

    /// Source with a prefix that is not the default device.
    fn parse_prefixed_source(
        &self,
        prefix: &str,
        rest: &str,
        request: &mut RequestDescriptor,
        stack: &mut ErrorStack,
    ) -> Result<SourceOutcome> {
        let Some(entry) = self.registry.by_format(prefix) else {
            tracing::debug!(device = %prefix, "no plugin for prefix, foreign device");
            request.device_name = prefix.to_string();
            request.request = RequestKind::Generic;
            return Ok(SourceOutcome::Parsed(SourceFlags {
                is_foreign: true,
                ..SourceFlags::default()
            }));
        };

        if entry.class == PluginClass::Device {
            let substitute = entry.device_substitute(&request.api_delim);
            let rest = rest.trim();
            return Ok(SourceOutcome::Redirect(if rest.is_empty() {
                substitute
            } else {
                format!("{}/{}", substitute, rest)
            }));
        }

        request.request = entry.request;
        request.format = entry.format.clone();
        request.device_name = self.config.api_device.clone();

        let mut flags = SourceFlags::default();
        match entry.class {
            PluginClass::File => {
                // The client resolves the full path itself.
                request.file = basename(rest.trim()).to_string();
                request.path.clear();
            }
            PluginClass::Server | PluginClass::Library => {
                request.path = rest.to_string();
                request.file.clear();
                flags.is_server = entry.class == PluginClass::Server;
            }
            PluginClass::Function => {
                request.path = rest.to_string();
                request.file.clear();
                if !is_function_call(rest) {
                    return Err(stack.record(
                        LOCATION,
                        UdaError::Syntax(format!(
                            "Not a function when one is expected! - A Library plugin has been specified ({})",
                            entry.format
                        )),
                    ));
                }
                let args = outer_call_args(rest).ok_or_else(|| {
                    stack.record(LOCATION, UdaError::Syntax("Function syntax error - please correct".into()))
                })?;
                request.function = extract_function_name(rest, &request.api_delim);
                request.name_values =
                    parse_pairs(args, true).map_err(|e| stack.record("name_value_pairs", e))?;
            }
            PluginClass::Device => {}
        }

        tracing::debug!(format = %request.format, class = ?entry.class, "prefix identified");
        Ok(SourceOutcome::Parsed(flags))
    }

    /// Signal processing: subset, archive, function call and library.
    fn parse_signal(
        &self,
        request: &mut RequestDescriptor,
        no_source: bool,
        flags: SourceFlags,
        stack: &mut ErrorStack,
    ) -> Result<()> {
        if let Some(extracted) =
            extract_subset(&request.signal).map_err(|e| stack.record("extract_subset", e))?
        {
            request.signal = extracted.signal;
            request.subset = extracted.text;
            request.datasubset = extracted.subset;
        }

        let reduce = request.request != RequestKind::ReadUda && !flags.is_foreign;
        self.extract_archive(request, reduce)
            .map_err(|e| stack.record("extract_archive", e))?;
        if request.archive.is_empty() {
            request.archive = self.config.api_archive.clone();
        }

        let default_archive = self.config.api_archive.as_str();
        let mut is_function = false;
        if !flags.is_server && (no_source || !request.archive.eq_ignore_ascii_case(default_archive)) {
            if let Some(args) = outer_call_args(&request.signal) {
                let pairs = parse_pairs(args, true).map_err(|e| stack.record("name_value_pairs", e))?;
                request.name_values.extend(pairs);
                request.function = extract_function_name(&request.signal, &request.api_delim);
                is_function = true;
            }
        }

        if no_source {
            self.resolve_signal_only(request, is_function);
        } else if is_function && !request.archive.eq_ignore_ascii_case(default_archive) {
            let library = self.registry.by_format(&request.archive).filter(|entry| {
                entry.class == PluginClass::Function
                    && !entry.format.eq_ignore_ascii_case(SERVERSIDE_FORMAT)
            });
            if let Some(entry) = library {
                if matches!(request.request, RequestKind::Generic | RequestKind::Unknown) {
                    request.request = entry.request;
                    request.format = entry.format.clone();
                } else if request.request != entry.request {
                    tracing::warn!(
                        source_format = %request.format,
                        signal_library = %entry.format,
                        "Inconsistent Plugin Libraries: Source selected over Signal"
                    );
                }
            }
        }

        Ok(())
    }

    /// Without a source the signal alone selects the reader.
    fn resolve_signal_only(&self, request: &mut RequestDescriptor, is_function: bool) {
        if !is_function {
            request.request = RequestKind::Generic;
            return;
        }

        let library = self.registry.by_format(&request.archive);
        if let Some(entry) = library.filter(|e| e.class == PluginClass::Function) {
            request.request = entry.request;
            request.format = entry.format.clone();
            return;
        }

        match self.registry.server_side_default() {
            Some(default) => {
                request.request = default.request;
                request.format = default.format.clone();
            }
            None => {
                tracing::warn!(archive = %request.archive, "no function library for signal call");
                request.function.clear();
                request.request = library.map(|e| e.request).unwrap_or(RequestKind::Generic);
            }
        }
    }

    /// Split an `ARCHIVE<delim>` prefix off `request.signal`.
    ///
    /// With `reduce` the prefix is removed from the signal and a leading
    /// default archive is unwrapped. Prefixes with illegal characters or
    /// that clash with subset brackets leave the archive empty.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` error for an archive name of 1024 bytes or more.
    pub fn extract_archive(&self, request: &mut RequestDescriptor, reduce: bool) -> Result<()> {
        let delim = request.api_delim.clone();
        if delim.is_empty() {
            return Ok(());
        }

        loop {
            let signal = request.signal.trim().to_string();
            let Some(i) = signal.find(delim.as_str()) else {
                request.signal = signal;
                return Ok(());
            };

            let archive = signal[..i].trim();
            let remainder = &signal[i + delim.len()..];

            if i >= STRING_LENGTH - 1 {
                return Err(UdaError::Syntax("The ARCHIVE Name is too long!".into()));
            }

            if reduce && archive.eq_ignore_ascii_case(&self.config.api_archive) {
                request.archive.clear();
                request.signal = remainder.to_string();
                continue;
            }

            if !is_legal_file_path(archive) {
                request.archive.clear();
                return Ok(());
            }

            // `[1::2]` style text is a subset, not ARCHIVE::signal.
            let bracket = remainder.find(']').or_else(|| remainder.find('}'));
            let conflict = bracket.is_some_and(|end| {
                let inner = &remainder[..end];
                inner.is_empty() || is_number(inner)
            });

            if conflict {
                request.archive.clear();
            } else {
                request.archive = archive.to_string();
                if reduce {
                    request.signal = remainder.trim().to_string();
                }
            }

            tracing::debug!(archive = %request.archive, signal = %request.signal, "archive extracted");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_with(
        config: &Config,
        registry: &PluginRegistry,
        source: &str,
        signal: &str,
    ) -> Result<RequestDescriptor> {
        let mut stack = ErrorStack::new();
        RequestParser::new(config, registry).parse(source, signal, "", &mut stack)
    }

    fn parse(source: &str, signal: &str) -> Result<RequestDescriptor> {
        parse_with(
            &Config::default(),
            &PluginRegistry::with_standard_plugins(),
            source,
            signal,
        )
    }

    #[test]
    fn test_pulse_only() {
        let request = parse("99999", "").unwrap();
        assert_eq!(request.request, RequestKind::Generic);
        assert_eq!(request.exp_number, 99999);
        assert_eq!(request.pass, -1);
        assert_eq!(request.tpass, "");
    }

    #[test]
    fn test_pulse_and_pass() {
        let request = parse("99999/3", "").unwrap();
        assert_eq!(request.request, RequestKind::Generic);
        assert_eq!(request.exp_number, 99999);
        assert_eq!(request.pass, 3);
    }

    #[test]
    fn test_pulse_and_text_pass() {
        let request = parse("12345/LATEST", "ip").unwrap();
        assert_eq!(request.pass, -1);
        assert_eq!(request.tpass, "LATEST");
        assert_eq!(request.signal, "ip");
    }

    #[test]
    fn test_file_format_prefix() {
        let request = parse("NETCDF::/data/shot1.nc", "").unwrap();
        assert_eq!(request.request, RequestKind::Cdf);
        assert_eq!(request.format, "NETCDF");
        assert_eq!(request.file, "shot1.nc");
        assert_eq!(request.path, "");
    }

    #[test]
    fn test_archive_and_subset() {
        let request = parse("", "AMC::PLASMA_CURRENT[10:20:2]").unwrap();
        assert_eq!(request.archive, "AMC");
        assert_eq!(request.signal, "PLASMA_CURRENT");
        assert_eq!(request.subset, "[10:20:2]");
        let dim = &request.datasubset.dims[0];
        assert_eq!((dim.start, dim.stop, dim.stride, dim.count), (10, 20, 2, 6));
    }

    #[test]
    fn test_signal_function_falls_back_to_serverside() {
        let request = parse("", "MYFUNC(a=1, b='x,y')").unwrap();
        assert_eq!(request.request, RequestKind::ReadServerside);
        assert_eq!(request.format, SERVERSIDE_FORMAT);
        assert_eq!(request.function, "MYFUNC");
        let pairs: Vec<(&str, &str)> = request
            .name_values
            .iter()
            .map(|nv| (nv.name.as_str(), nv.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "x,y")]);
    }

    #[test]
    fn test_missing_request() {
        let mut stack = ErrorStack::new();
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let err = RequestParser::new(&config, &registry)
            .parse("  ", "", "", &mut stack)
            .unwrap_err();
        assert!(matches!(err, UdaError::MissingRequest));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.first().unwrap().location, LOCATION);
    }

    #[test]
    fn test_default_device_and_archive_are_missing_request() {
        let config = Config {
            api_device: "MAST".into(),
            api_archive: "MAST".into(),
            ..Config::default()
        };
        let registry = PluginRegistry::with_standard_plugins();
        let err = parse_with(&config, &registry, "MAST::", "MAST::").unwrap_err();
        assert!(matches!(err, UdaError::MissingRequest));
    }

    #[test]
    fn test_default_device_prefix_is_stripped() {
        let config = Config {
            api_device: "MAST".into(),
            ..Config::default()
        };
        let registry = PluginRegistry::with_standard_plugins();
        let request = parse_with(&config, &registry, "mast::12345", "ip").unwrap();
        assert_eq!(request.request, RequestKind::Generic);
        assert_eq!(request.exp_number, 12345);
        assert_eq!(request.device_name, "MAST");
    }

    #[test]
    fn test_default_archive_is_unwrapped() {
        let config = Config {
            api_archive: "MAST".into(),
            ..Config::default()
        };
        let registry = PluginRegistry::with_standard_plugins();
        let request = parse_with(&config, &registry, "12345", "MAST::AMC::ip").unwrap();
        assert_eq!(request.archive, "AMC");
        assert_eq!(request.signal, "ip");

        let request = parse_with(&config, &registry, "12345", "ip").unwrap();
        assert_eq!(request.archive, "MAST");
    }

    #[test]
    fn test_proxy_forwards_verbatim() {
        let config = Config {
            proxy_target: Some("proxy.example.org:56565".into()),
            ..Config::default()
        };
        let registry = PluginRegistry::with_standard_plugins();
        let request = parse_with(&config, &registry, "NETCDF::/a/b.nc", "AMC::ip[1:2]").unwrap();
        assert_eq!(request.request, RequestKind::ReadUda);
        assert_eq!(request.server, "proxy.example.org:56565");
        assert_eq!(request.signal, "AMC::ip[1:2]");
        assert!(request.datasubset.is_empty());
    }

    #[test]
    fn test_path_with_parentheses_is_syntax_error() {
        let err = parse("/a/b(c)", "").unwrap_err();
        assert!(err.to_string().contains("path with parenthesis"));
    }

    #[test]
    fn test_unrecognized_file_format() {
        let err = parse("/data/file.xyz", "").unwrap_err();
        assert!(matches!(err, UdaError::UnrecognizedFormat(_)));
    }

    #[test]
    fn test_bare_path_by_extension() {
        let mut env = std::collections::HashMap::new();
        env.insert("DATA".to_string(), "/store".to_string());
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let mut stack = ErrorStack::new();
        let request = RequestParser::new(&config, &registry)
            .with_env(&env)
            .parse("$DATA/shot1.h5", "", "", &mut stack)
            .unwrap();
        assert_eq!(request.request, RequestKind::Hdf5);
        assert_eq!(request.path, "/store/shot1.h5");
        assert_eq!(request.file, "shot1.h5");
    }

    #[test]
    fn test_source_function() {
        let request = parse("compute(a=1, /verbose)", "").unwrap();
        assert_eq!(request.request, RequestKind::ReadServerside);
        assert_eq!(request.function, "compute");
        assert_eq!(request.name_value("verbose"), Some("true"));
    }

    #[test]
    fn test_source_function_with_library_qualifier() {
        let mut registry = PluginRegistry::with_standard_plugins();
        let kind = registry.register_plugin("MYLIB", PluginClass::Function, "");
        let config = Config {
            api_device: "MAST".into(),
            ..Config::default()
        };
        let request = parse_with(&config, &registry, "MAST::MYLIB::fit(x=2)", "").unwrap();
        assert_eq!(request.request, kind);
        assert_eq!(request.function, "fit");
        assert_eq!(request.name_value("x"), Some("2"));
    }

    #[test]
    fn test_library_prefix_requires_call() {
        let mut registry = PluginRegistry::with_standard_plugins();
        registry.register_plugin("MYLIB", PluginClass::Function, "");
        let err = parse_with(&Config::default(), &registry, "MYLIB::/not/a/call", "").unwrap_err();
        assert!(err.to_string().contains("Not a function"));
    }

    #[test]
    fn test_foreign_device_keeps_signal() {
        let request = parse("JT60::12345", "X::y").unwrap();
        assert_eq!(request.request, RequestKind::Generic);
        assert_eq!(request.device_name, "JT60");
        assert_eq!(request.archive, "X");
        assert_eq!(request.signal, "X::y");
    }

    #[test]
    fn test_device_substitution() {
        let mut registry = PluginRegistry::with_standard_plugins();
        registry.register_device("JET", "UDA", "data.jet.uk", Some(56565));
        let request = parse_with(&Config::default(), &registry, "JET::12345", "ip").unwrap();
        assert_eq!(request.request, RequestKind::ReadUda);
        assert_eq!(request.server, "data.jet.uk:56565");
        assert_eq!(request.file, "12345");
    }

    #[test]
    fn test_device_loop_is_bounded() {
        let mut registry = PluginRegistry::with_standard_plugins();
        registry.register_device("LOOP", "LOOP", "host", None);
        let config = Config {
            max_redirects: 3,
            ..Config::default()
        };
        let mut stack = ErrorStack::new();
        let err = RequestParser::new(&config, &registry)
            .parse("LOOP::x", "", "", &mut stack)
            .unwrap_err();
        assert!(matches!(err, UdaError::TooManyRedirects(3)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_mds_source() {
        let request = parse("MDS::mds.server/tree/42", "\\top:ip").unwrap();
        assert_eq!(request.request, RequestKind::Mds);
        assert_eq!(request.server, "mds.server");
        assert_eq!(request.file, "tree");
        assert_eq!(request.exp_number, 42);
    }

    #[test]
    fn test_remote_uda_source() {
        let request = parse("UDA::host:56565/12345", "AMC::ip").unwrap();
        assert_eq!(request.request, RequestKind::ReadUda);
        assert_eq!(request.server, "host:56565");
        assert_eq!(request.file, "12345");
        // Signals bound for another server keep their archive.
        assert_eq!(request.signal, "AMC::ip");
    }

    #[test]
    fn test_sql_source() {
        let request = parse("SQL::dbhost/catalogue", "q").unwrap();
        assert_eq!(request.request, RequestKind::Sql);
        assert_eq!(request.server, "dbhost");
        assert_eq!(request.path, "catalogue");
    }

    #[test]
    fn test_signal_library_selected() {
        let mut registry = PluginRegistry::with_standard_plugins();
        let kind = registry.register_plugin("MYLIB", PluginClass::Function, "");
        let request = parse_with(&Config::default(), &registry, "12345", "MYLIB::fn(x=1)").unwrap();
        assert_eq!(request.request, kind);
        assert_eq!(request.format, "MYLIB");
        assert_eq!(request.function, "fn");
        assert_eq!(request.exp_number, 12345);
    }

    #[test]
    fn test_source_wins_over_signal_library() {
        let mut registry = PluginRegistry::with_standard_plugins();
        registry.register_plugin("MYLIB", PluginClass::Function, "");
        let request = parse_with(&Config::default(), &registry, "NETCDF::/a/b.nc", "MYLIB::fn()").unwrap();
        assert_eq!(request.request, RequestKind::Cdf);
        assert_eq!(request.function, "fn");
    }

    #[test]
    fn test_server_signal_not_a_function() {
        let request = parse("MDS::tree/1", "AMC::f(x)").unwrap();
        assert_eq!(request.function, "");
        assert!(request.name_values.is_empty());
    }

    #[test]
    fn test_bad_subset_is_recorded() {
        let mut stack = ErrorStack::new();
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let err = RequestParser::new(&config, &registry)
            .parse("12345", "ip[5:2]", "", &mut stack)
            .unwrap_err();
        assert!(matches!(err, UdaError::Syntax(_)));
        assert_eq!(stack.first().unwrap().location, "extract_subset");
    }

    #[test]
    fn test_custom_delimiter() {
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let mut stack = ErrorStack::new();
        let request = RequestParser::new(&config, &registry)
            .parse("NETCDF->/data/x.nc", "AMC->ip", "->", &mut stack)
            .unwrap();
        assert_eq!(request.api_delim, "->");
        assert_eq!(request.format, "NETCDF");
        assert_eq!(request.archive, "AMC");
        assert_eq!(request.signal, "ip");
    }

    #[test]
    fn test_extract_function_name() {
        assert_eq!(extract_function_name(" LIB :: fn (a)", "::"), "fn");
        assert_eq!(extract_function_name("fn()", "::"), "fn");
    }

    #[test]
    fn test_function_call_layout() {
        assert!(is_function_call("fun(a/b/c)"));
        assert!(!is_function_call("/a/b/fun(x)"));
        assert!(!is_function_call("fun(x)/y"));
        assert!(!is_function_call("fun"));
    }

    #[test]
    fn test_archive_too_long() {
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let parser = RequestParser::new(&config, &registry);
        let mut request = RequestDescriptor::new("", &format!("{}::x", "A".repeat(2000)), "::");
        let err = parser.extract_archive(&mut request, true).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_archive_illegal_characters_reset() {
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let parser = RequestParser::new(&config, &registry);
        let mut request = RequestDescriptor::new("", "a b::x", "::");
        parser.extract_archive(&mut request, true).unwrap();
        assert_eq!(request.archive, "");
        assert_eq!(request.signal, "a b::x");
    }
}
