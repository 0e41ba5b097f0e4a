use ddp_rs::connection::DDPConnection;
use rgb::RGB8;

/// Streams frames to a DDP receiver (WLED and friends), three bytes per pixel.
pub struct DdpWriter {
    connection: DDPConnection,
    scratch: Vec<u8>,
    frames_sent: u64,
}

impl DdpWriter {
    pub fn new(connection: DDPConnection) -> Self {
        Self {
            connection,
            scratch: Vec::new(),
            frames_sent: 0,
        }
    }
}

impl smart_leds_trait::SmartLedsWrite for DdpWriter {
    type Error = ddp_rs::error::DDPError;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.scratch.clear();
        self.scratch.extend(
            iterator
                .into_iter()
                .map(Into::into)
                .flat_map(|rgb: RGB8| [rgb.r, rgb.g, rgb.b]),
        );

        let sent = self.connection.write(&self.scratch)?;
        self.frames_sent += 1;
        tracing::trace!(frame = self.frames_sent, bytes = sent, "Sent frame");
        Ok(())
    }
}
