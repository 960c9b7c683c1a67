pub mod alarms;
