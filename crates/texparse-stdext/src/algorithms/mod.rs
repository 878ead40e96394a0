pub mod substringsearch;
