mod test_transport_failure_reap;
