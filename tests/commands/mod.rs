mod test_send;
