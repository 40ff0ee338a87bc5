use serde::Serialize;

/// Seconds between automatic testimonial rotations
pub const ROTATION_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Testimonial {
    pub name: &'static str,
    pub role: &'static str,
    pub quote: &'static str,
    pub rating: u8,
}

pub const TESTIMONIALS: &[Testimonial] = &[
    Testimonial {
        name: "Priya Sharma",
        role: "Financial Analyst",
        quote: "I dropped a quarterly workbook in and had a clean revenue chart before my coffee cooled.",
        rating: 5,
    },
    Testimonial {
        name: "Marcus Lee",
        role: "Operations Manager",
        quote: "The 3D views make our warehouse throughput data finally readable for the whole team.",
        rating: 5,
    },
    Testimonial {
        name: "Elena Rossi",
        role: "Research Assistant",
        quote: "Upload, pick two columns, done. It replaced a pile of one-off spreadsheet macros.",
        rating: 4,
    },
    Testimonial {
        name: "David Okafor",
        role: "Small Business Owner",
        quote: "Dark mode and a dashboard that just lists my files. Exactly what I needed.",
        rating: 5,
    },
];

/// Position within a fixed-length rotation; all moves wrap except `go_to`, which clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carousel {
    index: usize,
    len: usize,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Carousel { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn next(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
        self.index
    }

    pub fn prev(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
        self.index
    }

    pub fn go_to(&mut self, index: usize) -> usize {
        self.index = index.min(self.len.saturating_sub(1));
        self.index
    }

    pub fn next_index(&self) -> usize {
        let mut c = *self;
        c.next()
    }

    pub fn prev_index(&self) -> usize {
        let mut c = *self;
        c.prev()
    }
}
