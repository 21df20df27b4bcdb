// Test suite for the telemetry engine

#[cfg(test)]
mod support;






#[cfg(test)]
mod gallery_tests;


#[cfg(test)]
mod config_tests;


#[cfg(test)]
mod input_validation_tests;

#[cfg(test)]
mod integration_tests;
