//! Core types for the intersection simulation
//!
//! Plain value types shared by every component: ids, vectors, rectangles,
//! lanes and vehicle categories.

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub SimId);

/// A 2D point or vector in screen space (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Component along the given axis
    pub fn along(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Horizontal => self.x,
            Axis::Vertical => self.y,
        }
    }

    /// Mutable component along the given axis
    pub fn along_mut(&mut self, axis: Axis) -> &mut f32 {
        match axis {
            Axis::Horizontal => &mut self.x,
            Axis::Vertical => &mut self.y,
        }
    }
}

/// An axis-aligned rectangle described by its top-left corner and size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive point containment
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }
}

/// Movement axis of a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

/// Travel direction on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Left,
    Down,
    Up,
}

impl Direction {
    pub fn axis(self) -> Axis {
        match self {
            Direction::Right | Direction::Left => Axis::Horizontal,
            Direction::Down | Direction::Up => Axis::Vertical,
        }
    }

    /// +1 when travelling towards growing coordinates, -1 otherwise
    pub fn sign(self) -> f32 {
        match self {
            Direction::Right | Direction::Down => 1.0,
            Direction::Left | Direction::Up => -1.0,
        }
    }
}

/// One of the four directional traffic streams through the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LaneId {
    /// Eastbound, below the horizontal centre line
    HorizontalBottom,
    /// Westbound, above the horizontal centre line
    HorizontalTop,
    /// Southbound, left of the vertical centre line
    VerticalLeft,
    /// Northbound, right of the vertical centre line
    VerticalRight,
}

impl LaneId {
    pub const ALL: [LaneId; 4] = [
        LaneId::HorizontalBottom,
        LaneId::HorizontalTop,
        LaneId::VerticalLeft,
        LaneId::VerticalRight,
    ];

    pub fn direction(self) -> Direction {
        match self {
            LaneId::HorizontalBottom => Direction::Right,
            LaneId::HorizontalTop => Direction::Left,
            LaneId::VerticalLeft => Direction::Down,
            LaneId::VerticalRight => Direction::Up,
        }
    }

    pub fn axis(self) -> Axis {
        self.direction().axis()
    }

    pub fn sign(self) -> f32 {
        self.direction().sign()
    }

    /// Maps a coordinate on the lane axis to "distance travelled" so that
    /// progress always grows in the direction of travel.
    pub fn progress(self, coordinate: f32) -> f32 {
        coordinate * self.sign()
    }

    /// Dense index for per-lane arrays
    pub fn index(self) -> usize {
        match self {
            LaneId::HorizontalBottom => 0,
            LaneId::HorizontalTop => 1,
            LaneId::VerticalLeft => 2,
            LaneId::VerticalRight => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LaneId::HorizontalBottom => "horizontal_bottom",
            LaneId::HorizontalTop => "horizontal_top",
            LaneId::VerticalLeft => "vertical_left",
            LaneId::VerticalRight => "vertical_right",
        }
    }
}

/// Vehicle category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleType {
    Compact,
    Sedan,
    Suv,
    Coupe,
    Van,
    Pickup,
    Bus,
    Truck,
    Semi,
    Motorcycle,
}

impl VehicleType {
    pub const ALL: [VehicleType; 10] = [
        VehicleType::Compact,
        VehicleType::Sedan,
        VehicleType::Suv,
        VehicleType::Coupe,
        VehicleType::Van,
        VehicleType::Pickup,
        VehicleType::Bus,
        VehicleType::Truck,
        VehicleType::Semi,
        VehicleType::Motorcycle,
    ];

    /// Footprint length along the direction of travel
    pub fn length(self) -> f32 {
        match self {
            VehicleType::Compact => 40.0,
            VehicleType::Sedan => 50.0,
            VehicleType::Suv => 55.0,
            VehicleType::Coupe => 45.0,
            VehicleType::Van => 65.0,
            VehicleType::Pickup => 60.0,
            VehicleType::Bus => 80.0,
            VehicleType::Truck => 70.0,
            VehicleType::Semi => 90.0,
            VehicleType::Motorcycle => 30.0,
        }
    }

    /// Footprint across the lane
    pub fn breadth(self) -> f32 {
        VEHICLE_BREADTH
    }

    /// Width and height of the footprint for a lane orientation
    pub fn dimensions(self, axis: Axis) -> Vec2 {
        match axis {
            Axis::Horizontal => Vec2::new(self.length(), self.breadth()),
            Axis::Vertical => Vec2::new(self.breadth(), self.length()),
        }
    }

    /// Relative frequency in random spawning
    pub fn spawn_weight(self) -> f32 {
        match self {
            VehicleType::Sedan => 5.0,
            VehicleType::Compact | VehicleType::Suv => 4.0,
            VehicleType::Coupe | VehicleType::Pickup => 3.0,
            VehicleType::Van | VehicleType::Motorcycle => 2.0,
            VehicleType::Truck => 1.5,
            VehicleType::Bus | VehicleType::Semi => 1.0,
        }
    }

    /// Single-character glyph for the ASCII map
    pub fn glyph(self) -> char {
        match self {
            VehicleType::Compact => 'c',
            VehicleType::Sedan => 's',
            VehicleType::Suv => 'u',
            VehicleType::Coupe => 'o',
            VehicleType::Van => 'v',
            VehicleType::Pickup => 'p',
            VehicleType::Bus => 'B',
            VehicleType::Truck => 'T',
            VehicleType::Semi => 'S',
            VehicleType::Motorcycle => 'm',
        }
    }
}

/// Width of every vehicle across its lane
pub const VEHICLE_BREADTH: f32 = 25.0;
