pub mod deep_sort;
