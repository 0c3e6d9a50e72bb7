mod reference_resolution_tests;
