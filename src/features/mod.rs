pub mod localities;
