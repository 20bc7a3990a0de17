//! `multipart/form-data` parsing.
//!
//! The parser walks a fully ingested body once with a forward-only cursor:
//!
//! ```text
//! Preamble ──> Headers ──> Content ──┬──> Headers   (next part)
//!                                    └──> Done      (closing delimiter)
//! ```
//!
//! It never fails. Framing it cannot make sense of ends the walk and the
//! parts recovered up to that point are returned; a trailing part whose
//! closing delimiter never arrived is dropped.

use bytes::Bytes;
use tracing::debug;

/// Content type assumed for a file part that does not declare one.
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// A file carried by a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field name the file was sent under
    pub field: String,

    /// Client-supplied file name
    pub file_name: String,

    /// Declared content type
    pub content_type: String,

    /// Raw file bytes
    pub content: Bytes,
}

/// Everything recovered from a multipart body, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
}

/// Extract the `boundary` parameter of a `multipart/*` content type.
pub fn boundary(content_type: &str) -> Option<String> {
    let params = split_params(content_type);
    let mime = params.first()?;
    if !mime
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
    {
        return None;
    }

    params.iter().skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = unquote(value.trim());
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Parse `body` using `boundary`.
pub fn parse(body: &[u8], boundary: &str) -> MultipartForm {
    MultipartParser::new(body, boundary).parse()
}

#[derive(Debug)]
enum State {
    Preamble,
    Headers,
    Content(PartHeaders),
    Done,
}

#[derive(Debug, Default)]
struct PartHeaders {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
}

/// Single-pass multipart state machine over an ingested body.
pub struct MultipartParser<'a> {
    buf: &'a [u8],
    delimiter: Vec<u8>,
    pos: usize,
    state: State,
}

impl<'a> MultipartParser<'a> {
    pub fn new(buf: &'a [u8], boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            buf,
            delimiter,
            pos: 0,
            state: State::Preamble,
        }
    }

    /// Run the machine to completion.
    pub fn parse(mut self) -> MultipartForm {
        let mut form = MultipartForm::default();

        loop {
            self.state = match std::mem::replace(&mut self.state, State::Done) {
                State::Preamble => self.skip_preamble(),
                State::Headers => self.read_headers(),
                State::Content(headers) => self.read_content(headers, &mut form),
                State::Done => break,
            };
        }

        debug!(
            fields = form.fields.len(),
            files = form.files.len(),
            "Parsed multipart body"
        );
        form
    }

    fn skip_preamble(&mut self) -> State {
        match find(self.buf, &self.delimiter, self.pos) {
            Some(idx) => {
                self.pos = idx + self.delimiter.len();
                self.after_delimiter()
            }
            None => State::Done,
        }
    }

    /// Decide what follows a delimiter: the closing `--`, or a line break
    /// (optionally preceded by transport padding) and the next part.
    fn after_delimiter(&mut self) -> State {
        let rest = &self.buf[self.pos..];
        if rest.starts_with(b"--") {
            return State::Done;
        }

        let padding = rest
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        let rest = &rest[padding..];
        if rest.starts_with(b"\r\n") {
            self.pos += padding + 2;
            State::Headers
        } else if rest.starts_with(b"\n") {
            self.pos += padding + 1;
            State::Headers
        } else {
            State::Done
        }
    }

    fn read_headers(&mut self) -> State {
        let rest = &self.buf[self.pos..];

        // A part may start directly with its blank line.
        if rest.starts_with(b"\r\n") {
            self.pos += 2;
            return State::Content(PartHeaders::default());
        }
        if rest.starts_with(b"\n") {
            self.pos += 1;
            return State::Content(PartHeaders::default());
        }

        let crlf = find(rest, b"\r\n\r\n", 0).map(|i| (i, 4));
        let lf = find(rest, b"\n\n", 0).map(|i| (i, 2));
        let (end, sep_len) = match (crlf, lf) {
            (Some(a), Some(b)) => {
                if a.0 <= b.0 {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return State::Done,
        };

        let block = String::from_utf8_lossy(&rest[..end]);
        self.pos += end + sep_len;
        State::Content(parse_part_headers(&block))
    }

    fn read_content(&mut self, headers: PartHeaders, form: &mut MultipartForm) -> State {
        let Some((content_end, next)) = self.next_delimiter() else {
            debug!("Multipart body ended without a closing delimiter");
            return State::Done;
        };

        let content = &self.buf[self.pos..content_end];
        self.pos = next;

        match (headers.file_name, headers.name) {
            (Some(file_name), name) => form.files.push(UploadedFile {
                field: name.unwrap_or_default(),
                file_name,
                content_type: headers
                    .content_type
                    .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string()),
                content: Bytes::copy_from_slice(content),
            }),
            (None, Some(name)) => {
                let value = String::from_utf8_lossy(content).into_owned();
                form.fields.push((name, value));
            }
            (None, None) => debug!("Skipping multipart part without a name"),
        }

        self.after_delimiter()
    }

    /// Locate the line break + delimiter that ends the current part.
    ///
    /// Returns the content end and the position just after the delimiter. A
    /// candidate only counts when followed by `--`, a line break or padding,
    /// so content that merely starts like the boundary is kept intact.
    fn next_delimiter(&self) -> Option<(usize, usize)> {
        let mut from = self.pos;
        while let Some(idx) = find(self.buf, &self.delimiter, from) {
            let after = idx + self.delimiter.len();
            let preceded_by_newline = idx > self.pos && self.buf[idx - 1] == b'\n';
            let well_terminated = matches!(
                self.buf.get(after),
                Some(b'-') | Some(b'\r') | Some(b'\n') | Some(b' ') | Some(b'\t')
            );

            if preceded_by_newline && well_terminated {
                let mut end = idx - 1;
                if end > self.pos && self.buf[end - 1] == b'\r' {
                    end -= 1;
                }
                return Some((end, after));
            }
            from = idx + 1;
        }
        None
    }
}

fn parse_part_headers(block: &str) -> PartHeaders {
    let mut headers = PartHeaders::default();

    for line in block.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-disposition") {
            for param in split_params(value).into_iter().skip(1) {
                let Some((key, val)) = param.split_once('=') else {
                    continue;
                };
                let key = key.trim();
                let val = unquote(val.trim()).to_string();
                if key.eq_ignore_ascii_case("name") {
                    headers.name = Some(val);
                } else if key.eq_ignore_ascii_case("filename") {
                    headers.file_name = Some(val);
                }
            }
        } else if name.eq_ignore_ascii_case("content-type") && !value.is_empty() {
            headers.content_type = Some(value.to_string());
        }
    }

    headers
}

/// Split a header value on `;`, ignoring separators inside quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, ';') => {
                params.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
