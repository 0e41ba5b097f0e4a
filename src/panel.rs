use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::OriginDimensions;
use embedded_graphics::prelude::RgbColor;
use embedded_graphics::prelude::Size;
use smart_leds::RGB8;
use smart_leds_trait::SmartLedsWrite;

/// The drawing surface an effect renders to.
///
/// `(0, 0)` is the top left pixel.
pub trait Panel {
    type Error;

    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Set a pixel in the frame buffer. Coordinates outside the panel are ignored.
    fn plot_pixel(&mut self, x: u32, y: u32, color: RGB8);

    /// Send the frame buffer to the LEDs.
    fn show(&mut self) -> Result<(), Self::Error>;

    /// Blank the frame buffer without sending it.
    fn clear(&mut self);

    fn set_brightness(&mut self, brightness: u8);
}

/// How the LED strip is wired through the matrix.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum Layout {
    /// Every row runs left to right.
    #[default]
    Rectangular,

    /// Odd rows run right to left.
    Serpentine,
}

impl Layout {
    fn strip_index(self, x: u32, y: u32, width: u32) -> usize {
        let x = match self {
            Layout::Serpentine if y % 2 == 1 => width - 1 - x,
            _ => x,
        };

        (y as usize) * (width as usize) + (x as usize)
    }
}

/// Frame buffer for a `width` x `height` matrix, kept in strip order.
pub struct Matrix<W> {
    writer: W,
    layout: Layout,
    width: u32,
    height: u32,
    brightness: u8,
    buffer: Vec<RGB8>,
}

impl<W> Matrix<W> {
    pub fn new(writer: W, layout: Layout, width: u32, height: u32) -> Self {
        Self {
            writer,
            layout,
            width,
            height,
            brightness: u8::MAX,
            buffer: vec![RGB8::default(); (width as usize) * (height as usize)],
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<RGB8> {
        self.contains(x, y)
            .then(|| self.buffer[self.layout.strip_index(x, y, self.width)])
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }
}

impl<W> Panel for Matrix<W>
where
    W: SmartLedsWrite,
    W::Color: From<RGB8>,
{
    type Error = W::Error;

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn plot_pixel(&mut self, x: u32, y: u32, color: RGB8) {
        if !self.contains(x, y) {
            tracing::trace!(x, y, "Ignoring pixel outside of the panel");
            return;
        }

        let idx = self.layout.strip_index(x, y, self.width);
        self.buffer[idx] = color;
    }

    fn show(&mut self) -> Result<(), Self::Error> {
        self.writer.write(smart_leds::brightness(
            self.buffer.iter().copied(),
            self.brightness,
        ))
    }

    fn clear(&mut self) {
        self.buffer.fill(RGB8::default());
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }
}

impl<W> OriginDimensions for Matrix<W> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl<W> embedded_graphics::draw_target::DrawTarget for Matrix<W> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for embedded_graphics::Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };

            if self.contains(x, y) {
                let idx = self.layout.strip_index(x, y, self.width);
                self.buffer[idx] = RGB8::new(color.r(), color.g(), color.b());
            }
        }

        Ok(())
    }
}
