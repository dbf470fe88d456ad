pub mod bit;

pub use bit::BitField;
