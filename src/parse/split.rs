//! The IOC shell word splitter.
//!
//! One left-to-right pass over the encoded line. Word and redirect-target
//! bytes are compacted into an output buffer as quotes, escapes and
//! separators are dropped; each finished word is closed with a sentinel and
//! remembered by its start offset, then decoded once the scan is over.

use std::collections::BTreeMap;

use super::encoding::StringEncoding;
use super::error::{RedirectState, SplitError};
use super::types::{
    DEFAULT_OUTPUT_FD, IFS, INPUT_FD, NREDIRECTS, OVERFLOW_REDIRECT_FD, ParseResult, Redirect,
    RedirectMode,
};

/// End-of-word marker in the output buffer, and end-of-line marker in the input.
const SENTINEL: u8 = 0;

/// Split `line` using the default Latin-1 codec.
pub fn split(line: &str) -> ParseResult {
    split_with_encoding(line, StringEncoding::default())
}

/// Split `line` into argv and redirects, encoding it with `encoding` first.
///
/// Never fails: malformed input is reported through [`ParseResult::error`]
/// alongside whatever was recovered before the problem was found.
pub fn split_with_encoding(line: &str, encoding: StringEncoding) -> ParseResult {
    let mut input = match encoding.encode(line) {
        Ok(bytes) => bytes,
        Err(ch) => {
            return ParseResult {
                error: Some(SplitError::Unencodable { ch, encoding }),
                ..Default::default()
            };
        }
    };
    input.push(SENTINEL);

    let result = Splitter::new(&input, encoding).run();
    log::debug!(
        "split {} word(s), {} redirect(s){}",
        result.argv.len(),
        result.redirects.len(),
        match &result.error {
            Some(e) => format!(": {e}"),
            None => String::new(),
        }
    );
    result
}

/// One-byte lookahead flag set by an unquoted backslash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Escape {
    #[default]
    Off,
    Pending,
}

/// Lexical state carried between bytes.
#[derive(Debug, Default)]
struct ScanState {
    in_word: bool,
    quote: Option<u8>,
    escape: Escape,
    /// The current word is only its opening quote so far.
    bare_quote: bool,
}

impl ScanState {
    /// Neither quoted nor escaped: separators, quotes and redirects are live.
    fn is_literal(&self) -> bool {
        self.quote.is_none() && self.escape == Escape::Off
    }
}

/// Reason the scan stopped before the end of the line.
#[derive(Debug, Clone, Copy)]
enum Abort {
    /// `<` or `>` while the redirect on this fd still waits for its target.
    Pending { fd: u8 },
    /// A second redirect for an fd that already has one.
    Duplicate { fd: u8 },
    /// `N>` with `N >= NREDIRECTS`.
    OutOfRange { fd: u8 },
}

#[derive(Debug)]
struct OpenRedirect {
    mode: RedirectMode,
    /// Offset of the target in the output buffer once a name has started.
    name: Option<usize>,
}

struct Splitter<'a> {
    input: &'a [u8],
    encoding: StringEncoding,
    /// Read cursor into `input`.
    pos: usize,
    /// Compacted words and targets; its length is the write cursor.
    buf: Vec<u8>,
    state: ScanState,
    words: Vec<usize>,
    redirects: BTreeMap<u8, OpenRedirect>,
    /// fd of the redirect whose target has not started yet.
    pending: Option<u8>,
    abort: Option<Abort>,
}

impl<'a> Splitter<'a> {
    fn new(input: &'a [u8], encoding: StringEncoding) -> Self {
        Self {
            input,
            encoding,
            pos: 0,
            buf: Vec::with_capacity(input.len()),
            state: ScanState::default(),
            words: Vec::new(),
            redirects: BTreeMap::new(),
            pending: None,
            abort: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn run(mut self) -> ParseResult {
        while self.abort.is_none() {
            let Some(c) = self.peek() else { break };
            self.pos += 1;
            if c == SENTINEL {
                break;
            }
            self.step(c);
        }
        self.finish()
    }

    fn step(&mut self, mut c: u8) {
        let mut sep = self.state.is_literal() && IFS.contains(&c);

        if self.state.is_literal() {
            if c == b'\\' {
                // Consumed; the flag survives into the next byte.
                self.state.escape = Escape::Pending;
                return;
            }
            if c == b'<' {
                if !self.open_redirect(INPUT_FD, RedirectMode::Read) {
                    return;
                }
                sep = true;
            }
            let mut fd = DEFAULT_OUTPUT_FD;
            if (b'1'..=b'9').contains(&c) && self.peek() == Some(b'>') {
                fd = c - b'0';
                c = b'>';
                self.pos += 1;
            }
            if c == b'>' {
                if let Some(pending) = self.pending {
                    self.abort = Some(Abort::Pending { fd: pending });
                    return;
                }
                if fd >= NREDIRECTS {
                    self.redirects
                        .entry(OVERFLOW_REDIRECT_FD)
                        .or_insert(OpenRedirect {
                            mode: RedirectMode::Write,
                            name: None,
                        });
                    self.abort = Some(Abort::OutOfRange { fd });
                    return;
                }
                let mode = if self.peek() == Some(b'>') {
                    self.pos += 1;
                    RedirectMode::Append
                } else {
                    RedirectMode::Write
                };
                if !self.open_redirect(fd, mode) {
                    return;
                }
                sep = true;
            }
        }

        if self.state.in_word {
            if Some(c) == self.state.quote {
                self.state.quote = None;
                self.state.bare_quote = false;
            } else if self.state.is_literal() {
                if sep {
                    self.state.in_word = false;
                    self.buf.push(SENTINEL);
                } else if is_quote(c) {
                    self.state.quote = Some(c);
                } else {
                    self.push_byte(c);
                }
            } else {
                self.push_byte(c);
            }
        } else if !sep {
            if is_quote(c) && self.state.escape == Escape::Off {
                self.state.quote = Some(c);
            }
            let start = self.buf.len();
            match self.pending.take() {
                Some(fd) => {
                    if let Some(redirect) = self.redirects.get_mut(&fd) {
                        redirect.name = Some(start);
                    }
                }
                None => self.words.push(start),
            }
            self.state.bare_quote = self.state.quote.is_some();
            if !self.state.bare_quote {
                self.buf.push(c);
            }
            self.state.in_word = true;
        }

        self.state.escape = Escape::Off;
    }

    fn push_byte(&mut self, c: u8) {
        self.buf.push(c);
        self.state.bare_quote = false;
    }

    /// Register a redirect on `fd` and make it pending. Returns false (and
    /// records why) when the line must be rejected instead.
    fn open_redirect(&mut self, fd: u8, mode: RedirectMode) -> bool {
        if let Some(pending) = self.pending {
            self.abort = Some(Abort::Pending { fd: pending });
            return false;
        }
        if self.redirects.contains_key(&fd) {
            self.abort = Some(Abort::Duplicate { fd });
            return false;
        }
        self.redirects.insert(fd, OpenRedirect { mode, name: None });
        self.pending = Some(fd);
        true
    }

    fn finish(mut self) -> ParseResult {
        if self.state.in_word {
            self.buf.push(SENTINEL);
        }

        // A word that is nothing but an unclosed opening quote does not count.
        // Target bookmarks are not in `words`, so `start` rules them out.
        if self.state.bare_quote
            && let Some(&start) = self.words.last()
            && start + 1 == self.buf.len()
        {
            self.words.pop();
        }

        let redirects: BTreeMap<u8, Redirect> = self
            .redirects
            .iter()
            .map(|(&fd, open)| {
                let name = open.name.map(|at| self.decode_at(at)).unwrap_or_default();
                (
                    fd,
                    Redirect {
                        name,
                        mode: open.mode,
                    },
                )
            })
            .collect();
        let argv: Vec<String> = self.words.iter().map(|&at| self.decode_at(at)).collect();

        let error = self.error(&redirects, !argv.is_empty());

        ParseResult {
            argv,
            redirects,
            error,
        }
    }

    fn error(&self, redirects: &BTreeMap<u8, Redirect>, has_words: bool) -> Option<SplitError> {
        let illegal = |fd: u8| {
            let redirect = redirects.get(&fd);
            SplitError::IllegalRedirection {
                redirect: RedirectState {
                    fd,
                    mode: redirect.map_or(RedirectMode::Write, |r| r.mode),
                    name: redirect
                        .filter(|r| !r.name.is_empty())
                        .map(|r| r.name.clone()),
                },
            }
        };

        if let Some(abort) = self.abort {
            return Some(match abort {
                Abort::Pending { fd } | Abort::Duplicate { fd } => illegal(fd),
                Abort::OutOfRange { fd } => SplitError::RedirectFdOutOfRange { fd },
            });
        }
        if let Some(fd) = self.pending {
            return Some(illegal(fd));
        }
        if let Some((&fd, _)) = redirects.iter().find(|(_, r)| r.name.is_empty()) {
            return Some(illegal(fd));
        }
        if has_words {
            if let Some(quote) = self.state.quote {
                return Some(SplitError::UnbalancedQuote {
                    quote: char::from(quote),
                });
            }
            if self.state.escape == Escape::Pending {
                return Some(SplitError::TrailingBackslash);
            }
        }
        None
    }

    /// Decode from `start` up to the next sentinel.
    fn decode_at(&self, start: usize) -> String {
        let tail = &self.buf[start..];
        let end = tail
            .iter()
            .position(|&b| b == SENTINEL)
            .unwrap_or(tail.len());
        self.encoding.decode(&tail[..end])
    }
}

fn is_quote(c: u8) -> bool {
    c == b'"' || c == b'\''
}
