//! Bus adapter carrying messages over the bridge's own stdio.
//!
//! Each record is `u32` BE topic length, topic bytes, `u32` BE payload
//! length, payload. Subscriptions read records from stdin, publishers
//! write them to stdout, so a bus-side relay can be piped to the bridge.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{MessageBus, MessageCallback, Publisher, SubscriptionId, TypeDescriptor};

/// Upper bound on a single record field
pub const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;

pub fn write_record<W: Write + ?Sized>(writer: &mut W, topic: &str, payload: &[u8]) -> io::Result<()> {
    write_field(writer, topic.as_bytes())?;
    write_field(writer, payload)?;
    writer.flush()
}

/// `Ok(None)` on clean end of input between records
pub fn read_record<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<(String, Vec<u8>)>> {
    let Some(topic) = read_field(reader)? else {
        return Ok(None);
    };
    let topic = String::from_utf8(topic)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let payload = read_field(reader)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "record truncated after topic")
    })?;
    Ok(Some((topic, payload)))
}

fn write_field<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|&len| len as usize <= MAX_RECORD_LEN)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "record field too large"))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(bytes)
}

fn read_field<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "record header truncated",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record field of {} bytes exceeds limit", len),
        ));
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(Some(bytes))
}

type Subscriptions = Arc<Mutex<HashMap<SubscriptionId, (String, Arc<dyn Fn(&[u8]) + Send + Sync>)>>>;

pub struct StdioBus {
    input: Mutex<Option<Box<dyn Read + Send>>>,
    output: Arc<Mutex<Box<dyn Write + Send>>>,
    subscriptions: Subscriptions,
    reader_started: AtomicBool,
    next_id: AtomicU64,
}

impl StdioBus {
    pub fn new() -> Self {
        Self::with_streams(Box::new(io::stdin()), Box::new(io::stdout()))
    }

    pub fn with_streams(input: Box<dyn Read + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            input: Mutex::new(Some(input)),
            output: Arc::new(Mutex::new(output)),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            reader_started: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
        }
    }

    /// One reader thread serves every subscription; it ends at end of input
    fn start_reader(&self) -> Result<()> {
        if self.reader_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut input = self
            .input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| DomainError::Bus("stdin already consumed".to_string()))?;
        let subscriptions = self.subscriptions.clone();

        thread::Builder::new()
            .name("stdio-bus-reader".to_string())
            .spawn(move || loop {
                match read_record(&mut input) {
                    Ok(Some((topic, payload))) => {
                        let callbacks: Vec<_> = subscriptions
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .values()
                            .filter(|(subscribed, _)| *subscribed == topic)
                            .map(|(_, callback)| callback.clone())
                            .collect();
                        for callback in callbacks {
                            callback(&payload);
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Bus input closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read bus record: {}", e);
                        break;
                    }
                }
            })
            .map(|_| ())
            .map_err(|e| DomainError::Bus(format!("failed to start bus reader: {}", e)))
    }
}

impl Default for StdioBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for StdioBus {
    fn subscribe(
        &self,
        topic: &str,
        message_type: &TypeDescriptor,
        callback: MessageCallback,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, (topic.to_string(), Arc::from(callback)));
        self.start_reader()?;

        tracing::info!(topic, message_type = %message_type.name, "Subscribed on stdin");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::Bus(format!("unknown subscription {:?}", id)))
    }

    fn advertise(&self, topic: &str, message_type: &TypeDescriptor) -> Result<Box<dyn Publisher>> {
        tracing::info!(topic, message_type = %message_type.name, "Publishing on stdout");
        Ok(Box::new(StdioPublisher {
            topic: topic.to_string(),
            output: self.output.clone(),
        }))
    }
}

struct StdioPublisher {
    topic: String,
    output: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Publisher for StdioPublisher {
    fn send(&self, message: &[u8]) -> Result<()> {
        let mut output = self
            .output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        write_record(&mut **output, &self.topic, message).map_err(|e| DomainError::Bus(e.to_string()))
    }
}
