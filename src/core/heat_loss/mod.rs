pub mod building;
pub mod room;
pub mod temperatures;
