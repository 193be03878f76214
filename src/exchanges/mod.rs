pub mod bitflyer;
