pub mod bds05;
pub mod bds08;
pub mod bds09;
