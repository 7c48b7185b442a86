/// One dispatched server-sent event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerEvent {
    /// `event:` field, if the server named the event
    pub event: Option<String>,
    /// Last `id:` seen on the stream
    pub id: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Incremental decoder for the `text/event-stream` framing.
///
/// Feed it arbitrary byte chunks; complete events come out as soon as their
/// terminating blank line arrives. Lines end in `\r\n`, `\n` or a bare
/// `\r`. Events whose data is empty (keep-alives) are not dispatched.
#[derive(Debug, Default)]
pub struct EventDecoder {
    /// Bytes of the current, unterminated line
    line: Vec<u8>,
    /// Leading BOM bytes matched so far
    bom_matched: usize,
    started: bool,
    /// Last byte was a `\r`; a following `\n` belongs to the same line end
    after_cr: bool,
    event: Option<String>,
    last_id: Option<String>,
    data: Vec<String>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if !self.started {
                if byte == BOM[self.bom_matched] {
                    self.bom_matched += 1;
                    self.started = self.bom_matched == BOM.len();
                    continue;
                }
                // Not a BOM after all; the matched bytes are content
                self.started = true;
                self.line.extend_from_slice(&BOM[..self.bom_matched]);
            }

            match byte {
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                _ => {
                    self.after_cr = false;
                    self.line.push(byte);
                }
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // retry and unknown fields are ignored; there is no reconnect
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data).join("\n");
        if data.is_empty() {
            return None;
        }
        Some(ServerEvent {
            event,
            id: self.last_id.clone(),
            data,
        })
    }
}
